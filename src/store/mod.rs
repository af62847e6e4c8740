//! Boundary to the native document store.
//!
//! Everything above this module speaks in terms of [`NativeCollection`]; a
//! driver-backed implementation and the in-process [`MemoryStore`] both sit
//! behind it.

pub mod memory;

pub use memory::{MemoryCollection, MemoryStore, StoreOp};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("invalid native filter: {0}")]
    InvalidFilter(String),

    #[error("invalid update document: {0}")]
    InvalidUpdate(String),

    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),

    #[error("connection closed")]
    Closed,

    #[error("{0}")]
    Backend(String),
}

/// Native find options; `None` leaves the store default in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<BsonDocument>,
    pub sort: Option<BsonDocument>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

impl FindOptions {
    /// Projection onto the native identifier alone.
    #[must_use]
    pub fn ids_only() -> Self {
        let mut projection = BsonDocument::new();
        projection.insert(crate::types::NATIVE_ID_FIELD, 1);
        Self { projection: Some(projection), ..Self::default() }
    }
}

/// Acknowledgement of a batch insert: position in the batch to assigned id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyAck {
    pub acknowledged: bool,
    pub inserted_ids: BTreeMap<usize, Bson>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

/// Store-native deletion report, returned to callers unchanged.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub acknowledged: bool,
    pub deleted: u64,
}

pub type DocumentStream = BoxStream<'static, Result<BsonDocument, StoreError>>;

#[async_trait]
pub trait NativeCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, filter: BsonDocument, options: FindOptions) -> Result<Vec<BsonDocument>, StoreError>;

    /// Lazily evaluated variant of [`find`](Self::find).
    async fn cursor(&self, filter: BsonDocument, options: FindOptions) -> Result<DocumentStream, StoreError>;

    async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> Result<Vec<BsonDocument>, StoreError>;

    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<InsertManyAck, StoreError>;

    async fn update_many(&self, filter: BsonDocument, update: BsonDocument) -> Result<UpdateReport, StoreError>;

    async fn delete_many(&self, filter: BsonDocument) -> Result<DeleteReport, StoreError>;

    async fn count_documents(&self, filter: BsonDocument) -> Result<u64, StoreError>;
}

/// A connected datastore handing out collection handles by store-facing name.
pub trait Datastore: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn NativeCollection>;
}
