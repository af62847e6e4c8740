use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

/// Stage-three query: one descriptor drives exactly one CRUD call.
///
/// Absent clauses impose no restriction. `limit` and `skip` of zero are treated
/// as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(alias = "using")]
    pub target: String,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<BsonDocument>,
    #[serde(default)]
    pub sort: Vec<SortClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_group: Option<GroupSpec>,
}

impl QueryDescriptor {
    #[must_use]
    pub fn new(target: &str) -> Self {
        Self { target: target.to_string(), ..Self::default() }
    }

    #[must_use]
    pub fn filter(mut self, where_clause: BsonDocument) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: &str, direction: &str) -> Self {
        self.sort.push(SortClause { field: field.to_string(), direction: direction.to_string() });
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    #[must_use]
    pub fn group(mut self, spec: GroupSpec) -> Self {
        self.aggregate_group = Some(spec);
        self
    }
}

/// One `(field, direction)` pair; direction is `asc` or `desc`, any case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "super::parse::SortClauseSerde")]
pub struct SortClause {
    pub field: String,
    pub direction: String,
}

/// Grouping request: group-by keys plus optional accumulated fields.
/// Every group also reports its document count under `count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "super::parse::GroupSpecSerde")]
pub struct GroupSpec {
    pub by: Vec<String>,
    pub sum: Vec<String>,
    pub average: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl GroupSpec {
    #[must_use]
    pub fn by(fields: &[&str]) -> Self {
        Self { by: fields.iter().map(|f| (*f).to_string()).collect(), ..Self::default() }
    }

    #[must_use]
    pub fn sum(mut self, field: &str) -> Self {
        self.sum.push(field.to_string());
        self
    }

    #[must_use]
    pub fn average(mut self, field: &str) -> Self {
        self.average.push(field.to_string());
        self
    }

    #[must_use]
    pub fn min(mut self, field: &str) -> Self {
        self.min.push(field.to_string());
        self
    }

    #[must_use]
    pub fn max(mut self, field: &str) -> Self {
        self.max.push(field.to_string());
        self
    }
}

/// Insert accepts a single record or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertInput {
    One(BsonDocument),
    Many(Vec<BsonDocument>),
}

impl InsertInput {
    #[must_use]
    pub fn into_vec(self) -> Vec<BsonDocument> {
        match self {
            Self::One(d) => vec![d],
            Self::Many(ds) => ds,
        }
    }
}

impl From<BsonDocument> for InsertInput {
    fn from(d: BsonDocument) -> Self {
        Self::One(d)
    }
}

impl From<Vec<BsonDocument>> for InsertInput {
    fn from(ds: Vec<BsonDocument>) -> Self {
        Self::Many(ds)
    }
}
