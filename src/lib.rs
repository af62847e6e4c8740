pub mod collection;
pub mod config;
pub mod document;
pub mod errors;
pub mod logger;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;
pub mod telemetry;
pub mod types;

use bson::Document as BsonDocument;
use std::sync::Arc;

use crate::collection::{CallContext, CollectionHandle};
use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::query::{InsertInput, QueryDescriptor, RecordStream};
use crate::registry::Registry;
use crate::store::{Datastore, DeleteReport};
use crate::telemetry::Telemetry;
use crate::types::Record;

/// The adapter: a populated registry bound to a connected datastore.
///
/// Every operation resolves the query's target model, translates the query
/// and makes the native calls. No state is kept between calls.
pub struct Adapter {
    registry: Arc<Registry>,
    datastore: Arc<dyn Datastore>,
    telemetry: Arc<Telemetry>,
}

impl Adapter {
    #[must_use]
    pub fn new(registry: Registry, datastore: Arc<dyn Datastore>) -> Self {
        let config = registry.config();
        let telemetry = Arc::new(Telemetry::new(config.slow_call_ms, config.audit));
        log::info!("adapter ready with {} registered models", registry.list_identities().len());
        Self { registry: Arc::new(registry), datastore, telemetry }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        self.registry.config()
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    fn resolve(&self, identity: &str) -> Result<(Arc<CollectionHandle>, CallContext), AdapterError> {
        let handle = self.registry.get(identity)?;
        let cx = CallContext {
            registry: self.registry.clone(),
            native: self.datastore.collection(handle.name_str()),
            telemetry: self.telemetry.clone(),
        };
        Ok((handle, cx))
    }

    /// # Errors
    /// `UnregisteredCollection`, filter translation errors, or
    /// `StoreCommunicationFailure`.
    pub async fn find(&self, query: &QueryDescriptor) -> Result<Vec<Record>, AdapterError> {
        let (handle, cx) = self.resolve(&query.target)?;
        handle.find(&cx, query).await
    }

    /// # Errors
    /// `UnregisteredCollection`, `InvalidIdentifier`, `InsertCountMismatch`,
    /// or `StoreCommunicationFailure`.
    pub async fn insert(&self, identity: &str, values: impl Into<InsertInput>) -> Result<Vec<Record>, AdapterError> {
        let values = values.into();
        let (handle, cx) = self.resolve(identity)?;
        handle.insert(&cx, values).await
    }

    /// # Errors
    /// `UnregisteredCollection`, filter translation errors, or
    /// `StoreCommunicationFailure`.
    pub async fn update(&self, query: &QueryDescriptor, values: &BsonDocument) -> Result<Vec<Record>, AdapterError> {
        let (handle, cx) = self.resolve(&query.target)?;
        handle.update(&cx, query, values).await
    }

    /// # Errors
    /// `UnregisteredCollection`, filter translation errors, or
    /// `StoreCommunicationFailure`.
    pub async fn destroy(&self, query: &QueryDescriptor) -> Result<DeleteReport, AdapterError> {
        let (handle, cx) = self.resolve(&query.target)?;
        handle.destroy(&cx, query).await
    }

    /// # Errors
    /// `UnregisteredCollection`, filter translation errors, or
    /// `StoreCommunicationFailure`.
    pub async fn count(&self, query: &QueryDescriptor) -> Result<u64, AdapterError> {
        let (handle, cx) = self.resolve(&query.target)?;
        handle.count(&cx, query).await
    }

    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `UnregisteredCollection` or filter translation errors; store failures
    /// arrive through the stream.
    pub fn stream(&self, query: &QueryDescriptor) -> Result<RecordStream, AdapterError> {
        let (handle, cx) = self.resolve(&query.target)?;
        handle.stream(&cx, query)
    }
}
