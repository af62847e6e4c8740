use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::eval::{as_f64, compare_bson, compare_docs, eval_filter, get_path, parse_filter, project};
use crate::store::StoreError;

/// Runs `$match`, `$group`, `$sort`, `$skip`, `$limit` and `$project` stages in order.
///
/// # Errors
/// Returns `UnsupportedStage` for any other stage and `InvalidFilter` for a
/// malformed stage body.
pub fn run_pipeline(mut docs: Vec<BsonDocument>, pipeline: &[BsonDocument]) -> Result<Vec<BsonDocument>, StoreError> {
    for stage in pipeline {
        if stage.len() != 1 {
            return Err(StoreError::InvalidFilter("a pipeline stage must have exactly one key".into()));
        }
        let Some((name, body)) = stage.iter().next() else { continue };
        match (name.as_str(), body) {
            ("$match", Bson::Document(filter)) => {
                let filter = parse_filter(filter)?;
                docs.retain(|d| eval_filter(d, &filter));
            }
            ("$group", Bson::Document(spec)) => docs = group(&docs, spec)?,
            ("$sort", Bson::Document(sort)) => docs.sort_by(|a, b| compare_docs(a, b, sort)),
            ("$project", Bson::Document(p)) => docs = docs.iter().map(|d| project(d, p)).collect(),
            ("$skip", n) => {
                let n = count_arg(name, n)?;
                docs = docs.into_iter().skip(n).collect();
            }
            ("$limit", n) => docs.truncate(count_arg(name, n)?),
            ("$match" | "$group" | "$sort" | "$project", _) => {
                return Err(StoreError::InvalidFilter(format!("{name} needs a document")));
            }
            (other, _) => return Err(StoreError::UnsupportedStage(other.to_string())),
        }
    }
    Ok(docs)
}

fn count_arg(stage: &str, v: &Bson) -> Result<usize, StoreError> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        _ => return Err(StoreError::InvalidFilter(format!("{stage} needs an integer"))),
    };
    usize::try_from(n).map_err(|_| StoreError::InvalidFilter(format!("{stage} must not be negative")))
}

#[derive(Debug, Clone, Copy)]
enum AccKind {
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone)]
enum AccState {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, n: u64 },
    Pick(Option<Bson>),
}

impl AccState {
    const fn new(kind: AccKind) -> Self {
        match kind {
            AccKind::Sum => Self::Sum { int: 0, float: 0.0, is_float: false },
            AccKind::Avg => Self::Avg { total: 0.0, n: 0 },
            AccKind::Min | AccKind::Max => Self::Pick(None),
        }
    }

    fn push(&mut self, kind: AccKind, v: &Bson) {
        match self {
            Self::Sum { int, float, is_float } => match v {
                Bson::Int32(i) => add_int(int, float, is_float, i64::from(*i)),
                Bson::Int64(i) => add_int(int, float, is_float, *i),
                other => {
                    if let Some(f) = as_f64(other) {
                        *float += f;
                        *is_float = true;
                    }
                }
            },
            Self::Avg { total, n } => {
                if let Some(f) = as_f64(v) {
                    *total += f;
                    *n += 1;
                }
            }
            Self::Pick(best) => {
                if matches!(v, Bson::Null | Bson::Undefined) {
                    return;
                }
                let keep = match best.as_ref() {
                    None => true,
                    Some(b) => {
                        let ord = compare_bson(v, b);
                        if matches!(kind, AccKind::Min) { ord == Ordering::Less } else { ord == Ordering::Greater }
                    }
                };
                if keep {
                    *best = Some(v.clone());
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Sum { int, float, is_float } => {
                if is_float {
                    Bson::Double(int as f64 + float)
                } else {
                    i32::try_from(int).map_or(Bson::Int64(int), Bson::Int32)
                }
            }
            #[allow(clippy::cast_precision_loss)]
            Self::Avg { total, n } => {
                if n == 0 { Bson::Null } else { Bson::Double(total / n as f64) }
            }
            Self::Pick(v) => v.unwrap_or(Bson::Null),
        }
    }
}

fn add_int(int: &mut i64, float: &mut f64, is_float: &mut bool, by: i64) {
    match int.checked_add(by) {
        Some(v) => *int = v,
        #[allow(clippy::cast_precision_loss)]
        None => {
            *float += by as f64;
            *is_float = true;
        }
    }
}

fn group(docs: &[BsonDocument], spec: &BsonDocument) -> Result<Vec<BsonDocument>, StoreError> {
    let id_expr = spec.get("_id").ok_or_else(|| StoreError::InvalidFilter("$group needs an _id".into()))?;
    let mut accs: Vec<(&str, AccKind, &Bson)> = Vec::new();
    for (name, body) in spec {
        if name == "_id" {
            continue;
        }
        let Some((op, operand)) = body.as_document().filter(|d| d.len() == 1).and_then(|d| d.iter().next())
        else {
            return Err(StoreError::InvalidFilter(format!("accumulator {name} needs one operator")));
        };
        let kind = match op.as_str() {
            "$sum" => AccKind::Sum,
            "$avg" => AccKind::Avg,
            "$min" => AccKind::Min,
            "$max" => AccKind::Max,
            other => return Err(StoreError::InvalidFilter(format!("unknown accumulator {other}"))),
        };
        accs.push((name.as_str(), kind, operand));
    }

    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in docs {
        let key = eval_expr(doc, id_expr);
        let pos = match groups.iter().position(|(k, _)| *k == key) {
            Some(p) => p,
            None => {
                groups.push((key, accs.iter().map(|(_, kind, _)| AccState::new(*kind)).collect()));
                groups.len() - 1
            }
        };
        let (_, states) = &mut groups[pos];
        for ((_, kind, operand), state) in accs.iter().zip(states.iter_mut()) {
            state.push(*kind, &eval_expr(doc, operand));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key);
            for ((name, _, _), state) in accs.iter().zip(states) {
                out.insert(*name, state.finish());
            }
            out
        })
        .collect())
}

/// `"$path"` reads a field, documents evaluate per key, anything else is a literal.
fn eval_expr(doc: &BsonDocument, expr: &Bson) -> Bson {
    match expr {
        Bson::String(s) if s.starts_with('$') => get_path(doc, &s[1..]).cloned().unwrap_or(Bson::Null),
        Bson::Document(d) => {
            Bson::Document(d.iter().map(|(k, v)| (k.clone(), eval_expr(doc, v))).collect())
        }
        other => other.clone(),
    }
}
