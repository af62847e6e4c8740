use bson::Document as BsonDocument;

/// Store-facing collection name.
pub type CollectionName = String;

/// A canonical record handed back to the caller: field name to value, with the
/// primary key exposed in string form under the schema's primary-key attribute.
pub type Record = BsonDocument;

/// Field holding the store's native identifier.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Primary-key attribute used when no schema field is flagged `primary_key`.
pub const DEFAULT_PRIMARY_KEY: &str = "id";
