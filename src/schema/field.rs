use bson::Bson;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Number,
    Boolean,
    Date,
    Datetime,
    #[default]
    Json,
    Array,
    #[serde(alias = "objectid")]
    ObjectId,
}

/// One attribute of a registered model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub auto_created_at: bool,
    #[serde(default)]
    pub auto_updated_at: bool,
    #[serde(default, alias = "defaultsTo", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Bson>,
    /// To-one association: identity of the referenced model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// To-many association: identity of the referenced model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        Self { field_type, ..Self::default() }
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    #[must_use]
    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Bson>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn auto_created_at(mut self) -> Self {
        self.auto_created_at = true;
        self
    }

    #[must_use]
    pub fn auto_updated_at(mut self) -> Self {
        self.auto_updated_at = true;
        self
    }

    #[must_use]
    pub fn model(identity: &str) -> Self {
        Self { field_type: FieldType::ObjectId, model: Some(identity.to_string()), ..Self::default() }
    }

    #[must_use]
    pub fn collection(identity: &str) -> Self {
        Self { field_type: FieldType::Array, collection: Some(identity.to_string()), ..Self::default() }
    }

    /// True when values of this field are references to another record's identifier.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.foreign_key || self.model.is_some()
    }

    /// Identity of the model this field points at, for single and plural associations.
    #[must_use]
    pub fn association_target(&self) -> Option<&str> {
        self.model.as_deref().or(self.collection.as_deref())
    }
}
