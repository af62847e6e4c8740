use bson::Document as BsonDocument;

use crate::errors::AdapterError;
use crate::schema::Schema;
use crate::store::FindOptions;

use super::identifier::native_field_name;
use super::types::{QueryDescriptor, SortClause};

/// Native sort document. A field named twice keeps the direction and
/// position of its last occurrence.
///
/// # Errors
/// Returns `FilterBuildFailure` for a direction other than `asc` or `desc`.
pub fn build_sort(clauses: &[SortClause], schema: &Schema) -> Result<Option<BsonDocument>, AdapterError> {
    if clauses.is_empty() {
        return Ok(None);
    }
    let mut out = BsonDocument::new();
    for clause in clauses {
        let dir = match clause.direction.to_ascii_lowercase().as_str() {
            "asc" => 1,
            "desc" => -1,
            other => {
                return Err(AdapterError::FilterBuildFailure(format!(
                    "invalid sort direction `{other}` for `{}`",
                    clause.field
                )));
            }
        };
        let field = native_field_name(&clause.field, schema);
        out.remove(field);
        out.insert(field, dir);
    }
    Ok(Some(out))
}

/// Inclusion projection. An empty list or `*` selects every field.
#[must_use]
pub fn build_projection(select: &[String], schema: &Schema) -> Option<BsonDocument> {
    if select.is_empty() || select.iter().any(|f| f == "*") {
        return None;
    }
    let mut out = BsonDocument::new();
    for f in select {
        out.insert(native_field_name(f, schema), 1);
    }
    Some(out)
}

/// # Errors
/// Propagates [`build_sort`] failures.
pub fn find_options(query: &QueryDescriptor, schema: &Schema) -> Result<FindOptions, AdapterError> {
    Ok(FindOptions {
        projection: build_projection(&query.select, schema),
        sort: build_sort(&query.sort, schema)?,
        limit: query.limit.filter(|n| *n > 0),
        skip: query.skip.filter(|n| *n > 0),
    })
}
