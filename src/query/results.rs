use bson::{Bson, Document as BsonDocument};

use crate::registry::Registry;
use crate::schema::Schema;
use crate::types::Record;

use super::identifier::to_external_record;

/// Turns native documents into canonical records, following populated
/// associations into their own model's schema.
pub struct ResultNormalizer<'a> {
    registry: &'a Registry,
    schema: &'a Schema,
}

impl<'a> ResultNormalizer<'a> {
    #[must_use]
    pub const fn new(registry: &'a Registry, schema: &'a Schema) -> Self {
        Self { registry, schema }
    }

    #[must_use]
    pub fn normalize(&self, docs: Vec<BsonDocument>) -> Vec<Record> {
        docs.into_iter().map(|d| self.normalize_one(d)).collect()
    }

    #[must_use]
    pub fn normalize_one(&self, doc: BsonDocument) -> Record {
        normalize_with(self.registry, self.schema, doc)
    }
}

fn normalize_with(registry: &Registry, schema: &Schema, doc: BsonDocument) -> Record {
    let mut record = to_external_record(doc, schema);
    for (name, field) in schema.fields() {
        let Some(target) = field.association_target() else {
            continue;
        };
        let Some(value) = record.get_mut(name) else { continue };
        match value {
            Bson::Document(_) | Bson::Array(_) => {
                let handle = registry.lookup(target);
                let default_schema;
                let target_schema = match &handle {
                    Some(h) => &h.schema,
                    None => {
                        default_schema = Schema::implicit();
                        &default_schema
                    }
                };
                populate(registry, target_schema, value);
            }
            _ => {}
        }
    }
    record
}

fn populate(registry: &Registry, schema: &Schema, value: &mut Bson) {
    match value {
        Bson::Document(d) => {
            let doc = std::mem::take(d);
            *d = normalize_with(registry, schema, doc);
        }
        Bson::Array(items) => {
            for item in items.iter_mut().filter(|i| matches!(i, Bson::Document(_))) {
                populate(registry, schema, item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdapterConfig;
    use crate::schema::{FieldDescriptor, FieldType, ModelDefinition};
    use bson::doc;
    use bson::oid::ObjectId;

    fn registry() -> Registry {
        let mut reg = Registry::new(AdapterConfig::default());
        reg.register(
            ModelDefinition::new("user")
                .attribute("name", FieldDescriptor::new(FieldType::String))
                .attribute("pets", FieldDescriptor::collection("pet")),
        )
        .unwrap();
        reg.register(
            ModelDefinition::new("pet")
                .attribute("owner", FieldDescriptor::model("user"))
                .attribute("tag", FieldDescriptor::new(FieldType::String).primary_key()),
        )
        .unwrap();
        reg
    }

    #[test]
    fn populated_children_use_their_own_primary_key() {
        let reg = registry();
        let user = reg.get("user").unwrap();
        let uid = ObjectId::new();
        let out = ResultNormalizer::new(&reg, &user.schema).normalize(vec![doc! {
            "_id": uid,
            "name": "ann",
            "pets": [ { "_id": "rex", "owner": uid }, { "_id": "tom", "owner": uid } ]
        }]);
        assert_eq!(
            out[0],
            doc! {
                "id": uid.to_hex(),
                "name": "ann",
                "pets": [ { "tag": "rex", "owner": uid.to_hex() }, { "tag": "tom", "owner": uid.to_hex() } ]
            }
        );
    }

    #[test]
    fn unregistered_association_target_falls_back_to_id() {
        let mut reg = Registry::new(AdapterConfig::default());
        reg.register(ModelDefinition::new("post").attribute("author", FieldDescriptor::model("ghost"))).unwrap();
        let post = reg.get("post").unwrap();
        let a = ObjectId::new();
        let out = ResultNormalizer::new(&reg, &post.schema).normalize_one(doc! { "author": { "_id": a } });
        assert_eq!(out, doc! { "author": { "id": a.to_hex() } });
    }
}
