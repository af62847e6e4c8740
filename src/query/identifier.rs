//! Translation between external string identifiers and native `ObjectId`s.
//!
//! Write path: the primary-key attribute is renamed to `_id` and, when the
//! schema says so, hex strings become `ObjectId`s. Read path: `_id` is renamed
//! back and native identifiers are rendered as 24-character hex strings. A
//! primary key that is not an `ObjectId` is returned as stored.
//! The read rewrite is idempotent.

use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::schema::Schema;
use crate::types::NATIVE_ID_FIELD;

/// Converts a caller-supplied identifier to its native form.
///
/// Arrays are converted element-wise; `null` and native ids pass through.
///
/// # Errors
/// Returns `InvalidIdentifier` for strings that are not 24 hex characters and for
/// values of any other type.
pub fn to_native_id(value: &Bson) -> Result<Bson, AdapterError> {
    match value {
        Bson::String(s) => s
            .parse::<ObjectId>()
            .map(Bson::ObjectId)
            .map_err(|_| AdapterError::InvalidIdentifier(s.clone())),
        Bson::ObjectId(_) | Bson::Null => Ok(value.clone()),
        Bson::Array(items) => Ok(Bson::Array(items.iter().map(to_native_id).collect::<Result<_, _>>()?)),
        other => Err(AdapterError::InvalidIdentifier(other.to_string())),
    }
}

#[must_use]
pub fn to_external_id(value: Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        Bson::Array(items) => Bson::Array(items.into_iter().map(to_external_id).collect()),
        other => other,
    }
}

/// True when values of `field` are native identifiers on the wire.
#[must_use]
pub fn is_native_id_field(field: &str, schema: &Schema, config: &AdapterConfig) -> bool {
    if field == schema.primary_key() || field == NATIVE_ID_FIELD {
        return schema.has_native_primary_key();
    }
    config.coerce_foreign_keys && schema.is_reference(field)
}

/// Store-facing name of an attribute.
#[must_use]
pub fn native_field_name<'a>(field: &'a str, schema: &Schema) -> &'a str {
    if field == schema.primary_key() { NATIVE_ID_FIELD } else { field }
}

/// Rewrites caller values for a write. A `null` primary key is omitted so the
/// store assigns one.
///
/// # Errors
/// Returns `InvalidIdentifier` if an identifier value cannot be converted.
pub fn to_native_values(
    values: &BsonDocument,
    schema: &Schema,
    config: &AdapterConfig,
) -> Result<BsonDocument, AdapterError> {
    let mut out = BsonDocument::new();
    for (key, value) in values {
        let name = native_field_name(key, schema);
        if name == NATIVE_ID_FIELD && matches!(value, Bson::Null) {
            continue;
        }
        let v = if is_native_id_field(key, schema, config) { to_native_id(value)? } else { value.clone() };
        out.insert(name, v);
    }
    Ok(out)
}

/// Read-path rewrite of one document. The primary key takes the position `_id` had.
/// Its value is only rendered as hex when the key is a native identifier; any
/// other key comes back exactly as stored.
#[must_use]
pub fn to_external_record(doc: BsonDocument, schema: &Schema) -> BsonDocument {
    let pk = schema.primary_key();
    let native_pk = schema.has_native_primary_key();
    let mut out = BsonDocument::new();
    for (key, value) in doc {
        if key == NATIVE_ID_FIELD {
            out.insert(pk, if native_pk { to_external_id(value) } else { value });
        } else if (key == pk && native_pk) || schema.is_reference(&key) {
            out.insert(key, to_external_id(value));
        } else {
            out.insert(key, value);
        }
    }
    out
}

#[must_use]
pub fn to_external_records(docs: Vec<BsonDocument>, schema: &Schema) -> Vec<BsonDocument> {
    docs.into_iter().map(|d| to_external_record(d, schema)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};
    use bson::doc;
    use std::collections::BTreeMap;

    fn schema() -> Schema {
        let mut attrs = BTreeMap::new();
        attrs.insert("owner".to_string(), FieldDescriptor::model("user"));
        attrs.insert("name".to_string(), FieldDescriptor::new(FieldType::String));
        Schema::from_attributes("pet", attrs).unwrap()
    }

    #[test]
    fn hex_string_round_trips_through_native_form() {
        let oid = ObjectId::new();
        let native = to_native_id(&Bson::String(oid.to_hex())).unwrap();
        assert_eq!(native, Bson::ObjectId(oid));
        assert_eq!(to_external_id(native), Bson::String(oid.to_hex()));
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        assert!(matches!(to_native_id(&Bson::String("abc".into())), Err(AdapterError::InvalidIdentifier(s)) if s == "abc"));
        assert!(matches!(to_native_id(&Bson::Int32(7)), Err(AdapterError::InvalidIdentifier(_))));
        let bad_in_list = Bson::Array(vec![Bson::String(ObjectId::new().to_hex()), Bson::String("nope".into())]);
        assert!(to_native_id(&bad_in_list).is_err());
    }

    #[test]
    fn write_values_rename_pk_and_coerce_references() {
        let owner = ObjectId::new();
        let id = ObjectId::new();
        let out = to_native_values(
            &doc! { "id": id.to_hex(), "name": "rex", "owner": owner.to_hex() },
            &schema(),
            &AdapterConfig::default(),
        )
        .unwrap();
        assert_eq!(out, doc! { "_id": id, "name": "rex", "owner": owner });
    }

    #[test]
    fn null_primary_key_is_dropped() {
        let out = to_native_values(&doc! { "id": Bson::Null, "name": "a" }, &schema(), &AdapterConfig::default())
            .unwrap();
        assert_eq!(out, doc! { "name": "a" });
    }

    #[test]
    fn foreign_keys_left_alone_when_coercion_disabled() {
        let config = AdapterConfig { coerce_foreign_keys: false, ..AdapterConfig::default() };
        let out = to_native_values(&doc! { "owner": "not-hex" }, &schema(), &config).unwrap();
        assert_eq!(out, doc! { "owner": "not-hex" });
    }

    #[test]
    fn non_native_primary_key_is_returned_as_stored() {
        let mut attrs = BTreeMap::new();
        attrs.insert("id".to_string(), FieldDescriptor::new(FieldType::String).primary_key());
        let schema = Schema::from_attributes("note", attrs).unwrap();
        let oid = ObjectId::new();
        let out = to_external_record(doc! { "_id": oid, "body": "x" }, &schema);
        assert_eq!(out, doc! { "id": oid, "body": "x" });
        let out = to_external_record(doc! { "_id": "n-1" }, &schema);
        assert_eq!(out, doc! { "id": "n-1" });
    }

    #[test]
    fn read_rewrite_keeps_position_and_is_idempotent() {
        let id = ObjectId::new();
        let owner = ObjectId::new();
        let once = to_external_record(doc! { "_id": id, "name": "rex", "owner": owner }, &schema());
        assert_eq!(once, doc! { "id": id.to_hex(), "name": "rex", "owner": owner.to_hex() });
        let twice = to_external_record(once.clone(), &schema());
        assert_eq!(once, twice);
    }
}
