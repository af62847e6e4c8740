#![allow(dead_code)]

use std::sync::Arc;

use bson::Document as BsonDocument;
use nexus_adapter::Adapter;
use nexus_adapter::config::AdapterConfig;
use nexus_adapter::registry::Registry;
use nexus_adapter::schema::{FieldDescriptor, FieldType, ModelDefinition};
use nexus_adapter::store::{MemoryCollection, MemoryStore};

pub fn registry(config: AdapterConfig) -> Registry {
    let mut reg = Registry::new(config);
    reg.register(
        ModelDefinition::new("user")
            .attribute("id", FieldDescriptor::new(FieldType::Integer).primary_key())
            .attribute("name", FieldDescriptor::new(FieldType::String))
            .attribute("age", FieldDescriptor::new(FieldType::Integer))
            .attribute("role", FieldDescriptor::new(FieldType::String).with_default("member"))
            .attribute("createdAt", FieldDescriptor::new(FieldType::Datetime).auto_created_at())
            .attribute("updatedAt", FieldDescriptor::new(FieldType::Datetime).auto_updated_at())
            .attribute("pets", FieldDescriptor::collection("pet")),
    )
    .unwrap();
    reg.register(
        ModelDefinition::new("pet")
            .table_name("pets")
            .attribute("name", FieldDescriptor::new(FieldType::String))
            .attribute("status", FieldDescriptor::new(FieldType::String))
            .attribute("weight", FieldDescriptor::new(FieldType::Integer))
            .attribute("owner", FieldDescriptor::model("user")),
    )
    .unwrap();
    reg.register(
        ModelDefinition::new("tag")
            .attribute("slug", FieldDescriptor::new(FieldType::String).primary_key())
            .attribute("label", FieldDescriptor::new(FieldType::String)),
    )
    .unwrap();
    reg
}

pub struct Fixture {
    pub adapter: Adapter,
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(AdapterConfig::default())
    }

    pub fn with_config(config: AdapterConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let adapter = Adapter::new(registry(config), store.clone());
        Self { adapter, store }
    }

    pub fn users(&self) -> Arc<MemoryCollection> {
        self.store.memory_collection("user")
    }

    pub fn pets(&self) -> Arc<MemoryCollection> {
        self.store.memory_collection("pets")
    }

    /// Inserts through the adapter and returns the canonical records.
    pub async fn seed(&self, identity: &str, docs: Vec<BsonDocument>) -> Vec<BsonDocument> {
        self.adapter.insert(identity, docs).await.unwrap()
    }
}

pub fn ids(records: &[BsonDocument], key: &str) -> Vec<String> {
    records.iter().map(|r| r.get_str(key).unwrap().to_string()).collect()
}

pub fn names(records: &[BsonDocument]) -> Vec<String> {
    records.iter().map(|r| r.get_str("name").unwrap().to_string()).collect()
}
