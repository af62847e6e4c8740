//! Grouping requests as a two-stage `$match` + `$group` pipeline.

use bson::{Bson, Document as BsonDocument};
use std::collections::HashSet;

use crate::errors::AdapterError;
use crate::schema::Schema;
use crate::types::NATIVE_ID_FIELD;

use super::identifier::native_field_name;
use super::types::GroupSpec;

/// Per-group document count, always reported.
pub const COUNT_FIELD: &str = "count";

/// # Errors
/// Returns `FilterBuildFailure` when two outputs share a name or a field is a
/// dotted path.
pub fn plan_pipeline(
    filter: BsonDocument,
    group: &GroupSpec,
    schema: &Schema,
) -> Result<Vec<BsonDocument>, AdapterError> {
    let mut names: HashSet<&str> = HashSet::from([COUNT_FIELD, NATIVE_ID_FIELD]);
    let mut key = BsonDocument::new();
    for f in &group.by {
        check_name(f)?;
        if !names.insert(f.as_str()) {
            return Err(AdapterError::FilterBuildFailure(format!(
                "cannot group by reserved or repeated name `{f}`"
            )));
        }
        key.insert(f.as_str(), format!("${}", native_field_name(f, schema)));
    }

    let mut spec = BsonDocument::new();
    spec.insert(NATIVE_ID_FIELD, if key.is_empty() { Bson::Null } else { Bson::Document(key) });
    let mut count = BsonDocument::new();
    count.insert("$sum", 1);
    spec.insert(COUNT_FIELD, count);

    let accumulators = [("$sum", &group.sum), ("$avg", &group.average), ("$min", &group.min), ("$max", &group.max)];
    for (op, fields) in accumulators {
        for f in fields {
            check_name(f)?;
            if !names.insert(f.as_str()) {
                return Err(AdapterError::FilterBuildFailure(format!(
                    "`{f}` is produced by more than one aggregate"
                )));
            }
            let mut acc = BsonDocument::new();
            acc.insert(op, format!("${}", native_field_name(f, schema)));
            spec.insert(f.as_str(), acc);
        }
    }

    let mut match_stage = BsonDocument::new();
    match_stage.insert("$match", filter);
    let mut group_stage = BsonDocument::new();
    group_stage.insert("$group", spec);
    Ok(vec![match_stage, group_stage])
}

fn check_name(name: &str) -> Result<(), AdapterError> {
    if name.contains('.') || name.starts_with('$') {
        return Err(AdapterError::FilterBuildFailure(format!("cannot aggregate on path `{name}`")));
    }
    Ok(())
}

/// Lifts the members of each group key to the top level and drops `_id`.
#[must_use]
pub fn flatten_groups(groups: Vec<BsonDocument>) -> Vec<BsonDocument> {
    groups
        .into_iter()
        .map(|mut g| {
            if let Some(Bson::Document(key)) = g.remove(NATIVE_ID_FIELD) {
                for (k, v) in key {
                    g.insert(k, v);
                }
            }
            g
        })
        .collect()
}
