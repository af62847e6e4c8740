//! Registered model schemas.
//!
//! A [`Schema`] is built once from a [`ModelDefinition`] and never mutated
//! afterwards. Building it applies the store-specific rewrites: integer `id`
//! primary keys and every reference field become native identifiers, and
//! auto-increment flags are dropped since the store has no sequence support.

mod field;
mod index;

pub use field::{FieldDescriptor, FieldType};
pub use index::{IndexSpec, derive_indexes};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::AdapterError;
use crate::types::DEFAULT_PRIMARY_KEY;

/// Model definition as handed over by the schema registry collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldDescriptor>,
}

impl ModelDefinition {
    #[must_use]
    pub fn new(identity: &str) -> Self {
        Self { identity: identity.to_string(), table_name: None, attributes: BTreeMap::new() }
    }

    #[must_use]
    pub fn table_name(mut self, name: &str) -> Self {
        self.table_name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: &str, field: FieldDescriptor) -> Self {
        self.attributes.insert(name.to_string(), field);
        self
    }

    /// Store-facing name: the explicit table name, else the lower-cased identity.
    #[must_use]
    pub fn store_identity(&self) -> String {
        self.table_name.clone().unwrap_or_else(|| self.identity.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: BTreeMap<String, FieldDescriptor>,
    primary_key: String,
}

impl Schema {
    /// # Errors
    /// Returns `AdapterError::Config` if more than one attribute is flagged as primary key.
    pub fn from_attributes(
        identity: &str,
        mut fields: BTreeMap<String, FieldDescriptor>,
    ) -> Result<Self, AdapterError> {
        if let Some(id) = fields.get_mut(DEFAULT_PRIMARY_KEY)
            && id.primary_key
            && id.field_type == FieldType::Integer
        {
            id.field_type = FieldType::ObjectId;
        }
        for (name, field) in &mut fields {
            if field.auto_increment {
                log::warn!("{identity}.{name}: auto_increment is not supported, ignoring");
                field.auto_increment = false;
            }
            if field.is_reference() {
                field.field_type = FieldType::ObjectId;
            }
        }

        let flagged: Vec<&String> =
            fields.iter().filter(|(_, f)| f.primary_key).map(|(n, _)| n).collect();
        let primary_key = match flagged.as_slice() {
            [] => DEFAULT_PRIMARY_KEY.to_string(),
            [one] => (*one).clone(),
            many => {
                return Err(AdapterError::Config(format!(
                    "model `{identity}` flags more than one primary key: {many:?}"
                )));
            }
        };
        fields.entry(primary_key.clone()).or_insert_with(|| {
            FieldDescriptor::new(FieldType::ObjectId).primary_key()
        });

        Ok(Self { fields, primary_key })
    }

    /// Schema assumed for models nobody registered: only an `id` native key.
    #[must_use]
    pub fn implicit() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            DEFAULT_PRIMARY_KEY.to_string(),
            FieldDescriptor::new(FieldType::ObjectId).primary_key(),
        );
        Self { fields, primary_key: DEFAULT_PRIMARY_KEY.to_string() }
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// True when the primary key is a store-generated native identifier.
    #[must_use]
    pub fn has_native_primary_key(&self) -> bool {
        self.fields.get(&self.primary_key).is_some_and(|f| f.field_type == FieldType::ObjectId)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter()
    }

    /// Fields whose values hold identifiers of other records.
    pub fn reference_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|(_, f)| f.is_reference()).map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn is_reference(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(FieldDescriptor::is_reference)
    }
}
