use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use crate::store::StoreError;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A native filter document compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    #[cfg(feature = "regex")]
    Regex { path: String, regex: regex::Regex },
}

/// # Errors
/// Returns `InvalidFilter` for operators the store does not understand.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, StoreError> {
    let mut parts = Vec::new();
    for (key, value) in doc {
        match key.as_str() {
            "$and" => parts.push(Filter::And(sub_filters(key, value)?)),
            "$or" => parts.push(Filter::Or(sub_filters(key, value)?)),
            "$nor" => parts.push(Filter::Nor(sub_filters(key, value)?)),
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!("unknown top-level operator {op}")));
            }
            path => match value {
                Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                    parts.push(parse_operators(path, ops)?);
                }
                literal => parts.push(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: literal.clone() }),
            },
        }
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.swap_remove(0),
        _ => Filter::And(parts),
    })
}

fn sub_filters(key: &str, value: &Bson) -> Result<Vec<Filter>, StoreError> {
    let Bson::Array(items) = value else {
        return Err(StoreError::InvalidFilter(format!("{key} must be an array")));
    };
    if items.is_empty() {
        return Err(StoreError::InvalidFilter(format!("{key} must be a nonempty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(StoreError::InvalidFilter(format!("{key} entries must be documents"))),
        })
        .collect()
}

fn parse_operators(path: &str, ops: &BsonDocument) -> Result<Filter, StoreError> {
    let path_s = path.to_string();
    let mut parts = Vec::new();
    for (op, operand) in ops {
        let cmp = |op| Filter::Cmp { path: path_s.clone(), op, value: operand.clone() };
        match op.as_str() {
            "$eq" => parts.push(cmp(CmpOp::Eq)),
            "$ne" => parts.push(cmp(CmpOp::Ne)),
            "$gt" => parts.push(cmp(CmpOp::Gt)),
            "$gte" => parts.push(cmp(CmpOp::Gte)),
            "$lt" => parts.push(cmp(CmpOp::Lt)),
            "$lte" => parts.push(cmp(CmpOp::Lte)),
            "$in" | "$nin" => {
                let Bson::Array(values) = operand else {
                    return Err(StoreError::InvalidFilter(format!("{op} needs an array")));
                };
                let values: Vec<Bson> = values.iter().take(MAX_IN_SET).cloned().collect();
                parts.push(if op == "$in" {
                    Filter::In { path: path_s.clone(), values }
                } else {
                    Filter::Nin { path: path_s.clone(), values }
                });
            }
            "$exists" => {
                let exists = match operand {
                    Bson::Boolean(b) => *b,
                    Bson::Int32(i) => *i != 0,
                    Bson::Int64(i) => *i != 0,
                    _ => return Err(StoreError::InvalidFilter("$exists needs a boolean".into())),
                };
                parts.push(Filter::Exists { path: path_s.clone(), exists });
            }
            "$regex" => {
                let Bson::String(pattern) = operand else {
                    return Err(StoreError::InvalidFilter("$regex needs a string".into()));
                };
                let options = ops.get_str("$options").unwrap_or("");
                parts.push(regex_filter(path, pattern, options)?);
            }
            "$options" => {}
            "$not" => {
                let Bson::Document(inner) = operand else {
                    return Err(StoreError::InvalidFilter("$not needs an operator document".into()));
                };
                parts.push(Filter::Nor(vec![parse_operators(path, inner)?]));
            }
            other => return Err(StoreError::InvalidFilter(format!("unknown operator {other}"))),
        }
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.swap_remove(0),
        _ => Filter::And(parts),
    })
}

#[cfg(feature = "regex")]
fn regex_filter(path: &str, pattern: &str, options: &str) -> Result<Filter, StoreError> {
    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| StoreError::InvalidFilter(e.to_string()))?;
    Ok(Filter::Regex { path: path.to_string(), regex })
}

#[cfg(not(feature = "regex"))]
fn regex_filter(_path: &str, _pattern: &str, _options: &str) -> Result<Filter, StoreError> {
    Err(StoreError::InvalidFilter("$regex needs the `regex` feature".into()))
}

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => {
            let found = get_path(doc, path);
            values.iter().any(|t| eq_matches(found, t))
        }
        Filter::Nin { path, values } => {
            let found = get_path(doc, path);
            !values.iter().any(|t| eq_matches(found, t))
        }
        Filter::Cmp { path, op, value } => {
            let found = get_path(doc, path);
            let want: fn(Ordering) -> bool = match op {
                CmpOp::Eq => return eq_matches(found, value),
                CmpOp::Ne => return !eq_matches(found, value),
                CmpOp::Gt => |o: Ordering| o == Ordering::Greater,
                CmpOp::Gte => |o: Ordering| o != Ordering::Less,
                CmpOp::Lt => |o: Ordering| o == Ordering::Less,
                CmpOp::Lte => |o: Ordering| o != Ordering::Greater,
            };
            found.is_some_and(|v| candidates(v).any(|c| compare_same_class(c, value).is_some_and(want)))
        }
        #[cfg(feature = "regex")]
        Filter::Regex { path, regex } => get_path(doc, path)
            .is_some_and(|v| candidates(v).any(|c| matches!(c, Bson::String(s) if regex.is_match(s)))),
    }
}

/// Equality with store semantics: a missing field equals `null`, and an array
/// field matches when any element does.
fn eq_matches(found: Option<&Bson>, target: &Bson) -> bool {
    match found {
        None => matches!(target, Bson::Null),
        Some(v) => {
            values_equal(v, target)
                || matches!(v, Bson::Array(items) if items.iter().any(|e| values_equal(e, target)))
        }
    }
}

fn candidates(v: &Bson) -> Box<dyn Iterator<Item = &Bson> + '_> {
    match v {
        Bson::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub(crate) fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Ordering restricted to values of the same type class, as range operators need.
fn compare_same_class(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => None,
    }
}

/// Total order used for sorting and `$min`/`$max`.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let Some(o) = compare_same_class(a, b) {
        return o;
    }
    type_rank(a).cmp(&type_rank(b))
}

fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::Symbol(_) | T::String(_) => 3,
        T::Document(_) => 4,
        T::Array(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::Boolean(_) => 8,
        T::DateTime(_) => 9,
        T::Timestamp(_) => 10,
        T::RegularExpression(_) => 11,
        T::MaxKey => 255,
        _ => 12,
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &BsonDocument) -> Ordering {
    for (field, dir) in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let descending = as_f64(dir).is_some_and(|d| d < 0.0);
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_falsy(v: &Bson) -> bool {
    matches!(v, Bson::Boolean(false) | Bson::Null) || as_f64(v).is_some_and(|f| f == 0.0)
}

/// Applies a projection document. Any truthy entry selects inclusion mode, in
/// which `_id` is kept unless explicitly excluded.
pub fn project(doc: &BsonDocument, projection: &BsonDocument) -> BsonDocument {
    let include_id = !projection.get("_id").is_some_and(is_falsy);
    let inclusion = projection.values().any(|v| !is_falsy(v));
    doc.iter()
        .filter(|(k, _)| {
            if k.as_str() == "_id" {
                include_id
            } else if inclusion {
                projection.get(k.as_str()).is_some_and(|v| !is_falsy(v))
            } else {
                !projection.contains_key(k.as_str())
            }
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Parsed update operators.
#[derive(Debug, Default, Clone)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

/// # Errors
/// Returns `InvalidUpdate` for replacement-style documents, unknown operators,
/// non-numeric `$inc` operands and attempts to change `_id`.
pub fn parse_update(update: &BsonDocument) -> Result<UpdateDoc, StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document is empty".into()));
    }
    let mut out = UpdateDoc::default();
    for (op, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(StoreError::InvalidUpdate(format!("{op} needs a document")));
        };
        if fields.contains_key("_id") {
            return Err(StoreError::InvalidUpdate("_id is immutable".into()));
        }
        match op.as_str() {
            "$set" => out.set.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
            "$unset" => out.unset.extend(fields.keys().cloned()),
            "$inc" => {
                for (k, v) in fields {
                    if as_f64(v).is_none() {
                        return Err(StoreError::InvalidUpdate(format!("$inc on {k} needs a number")));
                    }
                    out.inc.push((k.clone(), v.clone()));
                }
            }
            other if other.starts_with('$') => {
                return Err(StoreError::InvalidUpdate(format!("unknown update operator {other}")));
            }
            _ => return Err(StoreError::InvalidUpdate("update document must use operators".into())),
        }
    }
    Ok(out)
}

/// Returns true when the document changed.
pub fn apply_update(doc: &mut BsonDocument, upd: &UpdateDoc) -> bool {
    let mut changed = false;
    for (k, v) in &upd.set {
        if let Some((parent, last)) = parent_mut(doc, k) {
            let old = parent.insert(last, v.clone());
            changed |= old.as_ref() != Some(v);
        }
    }
    for (k, by) in &upd.inc {
        let next = add_numbers(get_path(doc, k), by);
        if let Some((parent, last)) = parent_mut(doc, k) {
            parent.insert(last, next);
            changed = true;
        }
    }
    for k in &upd.unset {
        if let Some((parent, last)) = parent_mut(doc, k) {
            changed |= parent.remove(&last).is_some();
        }
    }
    changed
}

fn parent_mut<'a>(root: &'a mut BsonDocument, path: &str) -> Option<(&'a mut BsonDocument, String)> {
    let mut segs: Vec<&str> = path.split('.').collect();
    let last = segs.pop()?.to_string();
    let mut cur = root;
    for seg in segs {
        if !matches!(cur.get(seg), Some(Bson::Document(_))) {
            cur.insert(seg, BsonDocument::new());
        }
        cur = match cur.get_mut(seg) {
            Some(Bson::Document(d)) => d,
            _ => return None,
        };
    }
    Some((cur, last))
}

fn add_numbers(current: Option<&Bson>, by: &Bson) -> Bson {
    let current = current.cloned().unwrap_or(Bson::Int32(0));
    match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let a = current.as_i64().or_else(|| current.as_i32().map(i64::from)).unwrap_or(0);
            let b = by.as_i64().or_else(|| by.as_i32().map(i64::from)).unwrap_or(0);
            Bson::Int64(a.saturating_add(b))
        }
        _ => Bson::Double(as_f64(&current).unwrap_or(0.0) + as_f64(by).unwrap_or(0.0)),
    }
}
