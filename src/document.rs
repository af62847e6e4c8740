use bson::{Bson, DateTime, Document as BsonDocument};

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::query::identifier::to_native_values;
use crate::schema::Schema;
use crate::types::NATIVE_ID_FIELD;

/// Builds the native documents sent to the store on writes.
pub struct DocumentBuilder<'a> {
    schema: &'a Schema,
    config: &'a AdapterConfig,
}

impl<'a> DocumentBuilder<'a> {
    #[must_use]
    pub const fn new(schema: &'a Schema, config: &'a AdapterConfig) -> Self {
        Self { schema, config }
    }

    /// Fills defaults for absent attributes, stamps creation and update
    /// timestamps, then converts identifiers.
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when an identifier value is malformed, or
    /// when a primary key the store cannot generate is missing.
    pub fn for_insert(&self, values: &BsonDocument) -> Result<BsonDocument, AdapterError> {
        let mut doc = values.clone();
        let now = Bson::DateTime(now());
        for (name, field) in self.schema.fields() {
            if doc.contains_key(name) {
                continue;
            }
            if let Some(default) = &field.default_value {
                doc.insert(name.as_str(), default.clone());
            } else if field.auto_created_at || field.auto_updated_at {
                doc.insert(name.as_str(), now.clone());
            }
        }
        let pk = self.schema.primary_key();
        if !self.schema.has_native_primary_key() && matches!(doc.get(pk), None | Some(Bson::Null)) {
            return Err(AdapterError::InvalidIdentifier(format!(
                "`{pk}` is not store-generated and must be supplied"
            )));
        }
        to_native_values(&doc, self.schema, self.config)
    }

    /// Stamps update timestamps and converts identifiers. The primary key is
    /// removed; records are never re-keyed by an update.
    ///
    /// # Errors
    /// Returns `InvalidIdentifier` when an identifier value is malformed.
    pub fn for_update(&self, values: &BsonDocument) -> Result<BsonDocument, AdapterError> {
        let mut doc = values.clone();
        doc.remove(self.schema.primary_key());
        doc.remove(NATIVE_ID_FIELD);
        if doc.is_empty() {
            return Ok(doc);
        }
        let now = Bson::DateTime(now());
        for (name, field) in self.schema.fields() {
            if field.auto_updated_at && !doc.contains_key(name) {
                doc.insert(name.as_str(), now.clone());
            }
        }
        to_native_values(&doc, self.schema, self.config)
    }
}

fn now() -> DateTime {
    DateTime::from_millis(chrono::Utc::now().timestamp_millis())
}
