use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

use crate::errors::AdapterError;

use super::types::{GroupSpec, QueryDescriptor, SortClause};

// Serde-facing shapes accepted on the wire

/// Either `{ "field": "name", "direction": "DESC" }` or the short `{ "name": "DESC" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortClauseSerde {
    Explicit { field: String, direction: String },
    Short(BsonDocument),
}

impl TryFrom<SortClauseSerde> for SortClause {
    type Error = String;
    fn try_from(s: SortClauseSerde) -> Result<Self, Self::Error> {
        match s {
            SortClauseSerde::Explicit { field, direction } => Ok(Self { field, direction }),
            SortClauseSerde::Short(d) => {
                if d.len() != 1 {
                    return Err(format!("sort clause must name exactly one field, got {}", d.len()));
                }
                let Some((field, dir)) = d.into_iter().next() else {
                    return Err("empty sort clause".into());
                };
                let direction = match dir {
                    Bson::String(s) => s,
                    Bson::Int32(1) | Bson::Int64(1) => "ASC".to_string(),
                    Bson::Int32(-1) | Bson::Int64(-1) => "DESC".to_string(),
                    other => return Err(format!("invalid sort direction for `{field}`: {other}")),
                };
                Ok(Self { field, direction })
            }
        }
    }
}

/// Explicit `{ "by": [...], "sum": [...] }` or compact `{ "status": 1 }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupSpecSerde {
    Explicit {
        by: Vec<String>,
        #[serde(default)]
        sum: Vec<String>,
        #[serde(default)]
        average: Vec<String>,
        #[serde(default)]
        min: Vec<String>,
        #[serde(default)]
        max: Vec<String>,
    },
    Compact(BsonDocument),
}

impl From<GroupSpecSerde> for GroupSpec {
    fn from(g: GroupSpecSerde) -> Self {
        match g {
            GroupSpecSerde::Explicit { by, sum, average, min, max } => {
                Self { by, sum, average, min, max }
            }
            GroupSpecSerde::Compact(d) => Self {
                by: d
                    .into_iter()
                    .filter(|(_, v)| !matches!(v, Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0) | Bson::Null))
                    .map(|(k, _)| k)
                    .collect(),
                ..Self::default()
            },
        }
    }
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a query descriptor.
pub fn parse_descriptor_json(json: &str) -> Result<QueryDescriptor, AdapterError> {
    Ok(serde_json::from_str(json)?)
}

/// Parses a criteria tree, keeping key order.
///
/// # Errors
/// Returns an error if the JSON string is not an object.
pub fn parse_criteria_json(json: &str) -> Result<BsonDocument, AdapterError> {
    Ok(serde_json::from_str(json)?)
}

/// # Errors
/// Returns an error if the JSON string is not an object.
pub fn parse_values_json(json: &str) -> Result<BsonDocument, AdapterError> {
    Ok(serde_json::from_str(json)?)
}
