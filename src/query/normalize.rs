//! Criteria tree to native filter.
//!
//! The input tree is walked once, depth first, preserving key order. Logical
//! keys (`and`, `or`, `not`) recurse; every other key is a field name whose
//! value is either a plain value (implicit equality) or a modifier document.
//! A modifier key that is not in the vocabulary fails the whole translation;
//! nothing is ever silently dropped.

use bson::{Bson, Document as BsonDocument};

use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::schema::Schema;

use super::identifier::{is_native_id_field, native_field_name, to_native_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logical {
    And,
    Or,
    Not,
}

fn logical(key: &str) -> Option<Logical> {
    match key {
        "and" | "$and" => Some(Logical::And),
        "or" | "$or" => Some(Logical::Or),
        "not" | "$nor" => Some(Logical::Not),
        _ => None,
    }
}

/// Field-level modifiers after alias resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Cmp(&'static str),
    In(&'static str),
    Like,
    Contains,
    StartsWith,
    EndsWith,
    Exists,
}

fn modifier(key: &str) -> Option<Modifier> {
    Some(match key {
        "eq" | "==" | "$eq" => Modifier::Cmp("$eq"),
        "!=" | "ne" | "not" | "$ne" => Modifier::Cmp("$ne"),
        ">" | "gt" | "$gt" => Modifier::Cmp("$gt"),
        ">=" | "gte" | "$gte" => Modifier::Cmp("$gte"),
        "<" | "lt" | "$lt" => Modifier::Cmp("$lt"),
        "<=" | "lte" | "$lte" => Modifier::Cmp("$lte"),
        "in" | "$in" => Modifier::In("$in"),
        "nin" | "$nin" => Modifier::In("$nin"),
        "like" => Modifier::Like,
        "contains" => Modifier::Contains,
        "startsWith" => Modifier::StartsWith,
        "endsWith" => Modifier::EndsWith,
        "exists" | "$exists" => Modifier::Exists,
        _ => return None,
    })
}

pub struct CriteriaNormalizer<'a> {
    schema: &'a Schema,
    config: &'a AdapterConfig,
}

impl<'a> CriteriaNormalizer<'a> {
    #[must_use]
    pub const fn new(schema: &'a Schema, config: &'a AdapterConfig) -> Self {
        Self { schema, config }
    }

    /// Translates a criteria tree. An absent tree matches everything.
    ///
    /// # Errors
    /// `UnsupportedOperator` for unknown modifiers, `InvalidIdentifier` for
    /// malformed identifier values, `FilterBuildFailure` for malformed shapes.
    pub fn normalize(&self, criteria: Option<&BsonDocument>) -> Result<BsonDocument, AdapterError> {
        criteria.map_or_else(|| Ok(BsonDocument::new()), |c| self.tree(c))
    }

    fn tree(&self, criteria: &BsonDocument) -> Result<BsonDocument, AdapterError> {
        let mut out = BsonDocument::new();
        for (key, value) in criteria {
            match logical(key) {
                Some(Logical::And) => {
                    out.insert("$and", self.branches(key, value)?);
                }
                Some(Logical::Or) => {
                    out.insert("$or", self.branches(key, value)?);
                }
                Some(Logical::Not) => {
                    // `$nor` takes a list; bare `not` takes a single tree
                    let negated = match value {
                        Bson::Document(d) => Bson::Array(vec![Bson::Document(self.tree(d)?)]),
                        other => self.branches(key, other)?,
                    };
                    out.insert("$nor", negated);
                }
                None if key.starts_with('$') => return Err(AdapterError::unsupported("", key)),
                None => {
                    let name = native_field_name(key, self.schema);
                    out.insert(name, self.condition(key, value)?);
                }
            }
        }
        Ok(out)
    }

    fn branches(&self, key: &str, value: &Bson) -> Result<Bson, AdapterError> {
        let Bson::Array(items) = value else {
            return Err(AdapterError::FilterBuildFailure(format!("`{key}` expects a list of criteria")));
        };
        if items.is_empty() {
            return Err(AdapterError::FilterBuildFailure(format!("`{key}` expects a non-empty list")));
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Bson::Document(d) = item else {
                return Err(AdapterError::FilterBuildFailure(format!("`{key}` branch is not a criteria object")));
            };
            out.push(Bson::Document(self.tree(d)?));
        }
        Ok(Bson::Array(out))
    }

    fn condition(&self, field: &str, value: &Bson) -> Result<Bson, AdapterError> {
        let id_field = is_native_id_field(field, self.schema, self.config);
        let coerce = |v: &Bson| if id_field { to_native_id(v) } else { Ok(v.clone()) };
        match value {
            Bson::Document(mods) => {
                if mods.is_empty() {
                    return Err(AdapterError::FilterBuildFailure(format!("empty modifier for `{field}`")));
                }
                let mut out = BsonDocument::new();
                for (key, operand) in mods {
                    let Some(m) = modifier(key) else {
                        return Err(AdapterError::unsupported(field, key));
                    };
                    match m {
                        Modifier::Cmp(op) => {
                            out.insert(op, coerce(operand)?);
                        }
                        Modifier::In(op) => {
                            let Bson::Array(items) = operand else {
                                return Err(AdapterError::FilterBuildFailure(format!(
                                    "`{key}` on `{field}` expects a list"
                                )));
                            };
                            let items = items.iter().map(coerce).collect::<Result<Vec<_>, _>>()?;
                            out.insert(op, items);
                        }
                        Modifier::Exists => {
                            let Bson::Boolean(b) = operand else {
                                return Err(AdapterError::FilterBuildFailure(format!(
                                    "`exists` on `{field}` expects a boolean"
                                )));
                            };
                            out.insert("$exists", *b);
                        }
                        Modifier::Like | Modifier::Contains | Modifier::StartsWith | Modifier::EndsWith => {
                            if id_field {
                                return Err(AdapterError::FilterBuildFailure(format!(
                                    "`{key}` cannot be applied to identifier field `{field}`"
                                )));
                            }
                            if out.contains_key("$regex") {
                                return Err(AdapterError::FilterBuildFailure(format!(
                                    "more than one pattern modifier on `{field}`"
                                )));
                            }
                            let Bson::String(text) = operand else {
                                return Err(AdapterError::FilterBuildFailure(format!(
                                    "`{key}` on `{field}` expects a string"
                                )));
                            };
                            out.insert("$regex", pattern_for(m, text));
                            if !self.config.case_sensitive {
                                out.insert("$options", "i");
                            }
                        }
                    }
                }
                Ok(Bson::Document(out))
            }
            Bson::Array(items) => {
                let items = items.iter().map(coerce).collect::<Result<Vec<_>, _>>()?;
                let mut out = BsonDocument::new();
                out.insert("$in", items);
                Ok(Bson::Document(out))
            }
            other => coerce(other),
        }
    }
}

fn pattern_for(m: Modifier, text: &str) -> String {
    match m {
        Modifier::Like => like_to_regex(text),
        Modifier::StartsWith => format!("^{}", escape_regex(text)),
        Modifier::EndsWith => format!("{}$", escape_regex(text)),
        _ => escape_regex(text),
    }
}

/// `%` matches any run, `_` any single character; everything else is literal.
#[must_use]
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => push_escaped(&mut out, c),
        }
    }
    out.push('$');
    out
}

#[must_use]
pub fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    if matches!(c, '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}
