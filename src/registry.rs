use std::collections::HashMap;
use std::sync::Arc;

use crate::collection::CollectionHandle;
use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::schema::ModelDefinition;

/// Explicit model registry.
///
/// Populated during start-up through `&mut self`, then shared read-only
/// (usually behind an `Arc`) by every component that resolves identities.
#[derive(Debug, Default)]
pub struct Registry {
    config: Arc<AdapterConfig>,
    collections: HashMap<String, Arc<CollectionHandle>>,
}

impl Registry {
    #[must_use]
    pub fn new(config: AdapterConfig) -> Self {
        Self { config: Arc::new(config), collections: HashMap::new() }
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// # Errors
    /// Returns `DuplicateCollection` if the identity is already registered, or a
    /// schema error from [`CollectionHandle::new`].
    pub fn register(&mut self, definition: ModelDefinition) -> Result<Arc<CollectionHandle>, AdapterError> {
        let key = definition.identity.to_lowercase();
        if self.collections.contains_key(&key) {
            return Err(AdapterError::DuplicateCollection(key));
        }
        let handle = Arc::new(CollectionHandle::new(definition, self.config.clone())?);
        self.collections.insert(key, handle.clone());
        Ok(handle)
    }

    /// # Errors
    /// Returns `UnregisteredCollection` if no model with this identity was registered.
    pub fn get(&self, identity: &str) -> Result<Arc<CollectionHandle>, AdapterError> {
        self.lookup(identity).ok_or_else(|| AdapterError::UnregisteredCollection(identity.to_string()))
    }

    #[must_use]
    pub fn lookup(&self, identity: &str) -> Option<Arc<CollectionHandle>> {
        self.collections.get(&identity.to_lowercase()).cloned()
    }

    #[must_use]
    pub fn list_identities(&self) -> Vec<String> {
        let mut out: Vec<String> = self.collections.keys().cloned().collect();
        out.sort();
        out
    }
}
