use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("No `{0}` model has been registered with this adapter")]
    UnregisteredCollection(String),

    #[error("Collection already registered: {0}")]
    DuplicateCollection(String),

    #[error("Unsupported operator `{operator}` on field `{field}`")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Filter build failure: {0}")]
    FilterBuildFailure(String),

    #[error("Store communication failure during {op}: {source}")]
    StoreCommunicationFailure {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Mismatch in id counts returned by insert: expected {expected}, got {actual}")]
    InsertCountMismatch { expected: usize, actual: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::StoreCommunicationFailure { op, source }
    }

    pub(crate) fn unsupported(field: &str, operator: &str) -> Self {
        Self::UnsupportedOperator { field: field.to_string(), operator: operator.to_string() }
    }
}

impl From<toml::de::Error> for AdapterError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
