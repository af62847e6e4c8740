use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

use super::Schema;

/// A single-key index derived from the schema at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: BsonDocument,
    pub unique: bool,
    pub sparse: bool,
}

/// Unique fields get a unique sparse index, `index` fields a plain sparse one.
/// The `id` attribute is skipped; the store always indexes its native identifier.
#[must_use]
pub fn derive_indexes(schema: &Schema) -> Vec<IndexSpec> {
    let mut out = Vec::new();
    for (name, field) in schema.fields() {
        if name == "id" {
            continue;
        }
        if !field.unique && !field.index {
            continue;
        }
        let mut keys = BsonDocument::new();
        keys.insert(name.clone(), 1);
        out.push(IndexSpec { keys, unique: field.unique, sparse: true });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use crate::schema::{FieldDescriptor, FieldType};
    use std::collections::BTreeMap;

    #[test]
    fn unique_wins_over_index_and_id_is_skipped() {
        let mut attrs = BTreeMap::new();
        attrs.insert("id".to_string(), FieldDescriptor::new(FieldType::ObjectId).primary_key().unique());
        attrs.insert("email".to_string(), FieldDescriptor::new(FieldType::String).unique().index());
        attrs.insert("age".to_string(), FieldDescriptor::new(FieldType::Integer).index());
        attrs.insert("bio".to_string(), FieldDescriptor::new(FieldType::Text));
        let schema = Schema::from_attributes("user", attrs).unwrap();
        let idx = derive_indexes(&schema);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx[0], IndexSpec { keys: doc! { "age": 1 }, unique: false, sparse: true });
        assert_eq!(idx[1], IndexSpec { keys: doc! { "email": 1 }, unique: true, sparse: true });
    }
}
