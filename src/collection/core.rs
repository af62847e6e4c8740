use std::sync::Arc;

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::schema::{IndexSpec, ModelDefinition, Schema, derive_indexes};
use crate::types::CollectionName;

/// A registered model: store-facing name, schema, config and derived indexes.
///
/// Created once per model and shared for the life of the process. Holds no
/// per-request state.
#[derive(Debug)]
pub struct CollectionHandle {
    pub identity: String,
    pub collection_name: CollectionName,
    pub schema: Schema,
    pub config: Arc<AdapterConfig>,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionHandle {
    /// # Errors
    /// Returns an error if the definition's attributes do not form a valid schema.
    pub fn new(definition: ModelDefinition, config: Arc<AdapterConfig>) -> Result<Self, AdapterError> {
        let identity = definition.identity.to_lowercase();
        let collection_name = definition.store_identity();
        let schema = Schema::from_attributes(&identity, definition.attributes)?;
        let indexes = derive_indexes(&schema);
        log::debug!(
            "registered model {identity} -> collection {collection_name} ({} indexes)",
            indexes.len()
        );
        Ok(Self { identity, collection_name, schema, config, indexes })
    }

    #[must_use]
    pub fn name_str(&self) -> &str {
        &self.collection_name
    }
}
