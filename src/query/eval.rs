use bson::{Bson, Document as BsonDocument};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_REGEX_LEN, Order, SortSpec};
use crate::errors::DbError;

/// A [`Filter`] with its regular expressions compiled, ready to test many documents.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    True,
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, re: Regex },
}

impl CompiledFilter {
    /// # Errors
    /// Returns `DbError::QueryError` when a regex pattern is too long or does not compile,
    /// or when an `$in`/`$nin` set is larger than the store accepts.
    pub fn compile(filter: &Filter) -> Result<Self, DbError> {
        Ok(Self { root: compile_node(filter)? })
    }

    #[must_use]
    pub fn matches(&self, doc: &BsonDocument) -> bool {
        eval_node(doc, &self.root)
    }
}

fn compile_node(filter: &Filter) -> Result<Node, DbError> {
    Ok(match filter {
        Filter::True => Node::True,
        Filter::And(fs) => Node::And(fs.iter().map(compile_node).collect::<Result<_, _>>()?),
        Filter::Or(fs) => Node::Or(fs.iter().map(compile_node).collect::<Result<_, _>>()?),
        Filter::Not(f) => Node::Not(Box::new(compile_node(f)?)),
        Filter::Exists { path, exists } => Node::Exists { path: path.clone(), exists: *exists },
        Filter::In { path, values } => Node::In { path: path.clone(), values: bounded_set(path, values)? },
        Filter::Nin { path, values } => Node::Nin { path: path.clone(), values: bounded_set(path, values)? },
        Filter::Cmp { path, op, value } => Node::Cmp { path: path.clone(), op: *op, value: value.clone() },
        Filter::Regex { path, pattern, case_insensitive } => {
            if pattern.len() > MAX_REGEX_LEN {
                return Err(DbError::QueryError(format!(
                    "regex on '{path}' exceeds {MAX_REGEX_LEN} bytes"
                )));
            }
            let re = RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map_err(|e| DbError::QueryError(format!("invalid regex on '{path}': {e}")))?;
            Node::Regex { path: path.clone(), re }
        }
    })
}

fn bounded_set(path: &str, values: &[Bson]) -> Result<Vec<Bson>, DbError> {
    if values.len() > MAX_IN_SET {
        return Err(DbError::QueryError(format!(
            "set on '{path}' has {} values, at most {MAX_IN_SET} allowed",
            values.len()
        )));
    }
    Ok(values.to_vec())
}

/// Compiles and evaluates in one step. Prefer [`CompiledFilter`] when scanning many documents.
///
/// # Errors
/// Returns an error if the filter contains an invalid regex.
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> Result<bool, DbError> {
    Ok(CompiledFilter::compile(filter)?.matches(doc))
}

fn eval_node(doc: &BsonDocument, node: &Node) -> bool {
    match node {
        Node::True => true,
        Node::And(ns) => ns.iter().all(|n| eval_node(doc, n)),
        Node::Or(ns) => ns.iter().any(|n| eval_node(doc, n)),
        Node::Not(n) => !eval_node(doc, n),
        Node::Exists { path, exists } => !resolve_path(doc, path).is_empty() == *exists,
        Node::In { path, values } => leaf_values(doc, path).iter().any(|v| is_in_set(v, values)),
        Node::Nin { path, values } => !leaf_values(doc, path).iter().any(|v| is_in_set(v, values)),
        Node::Cmp { path, op, value } => {
            let vals = leaf_values(doc, path);
            match op {
                // A missing field is "not equal".
                CmpOp::Ne => !vals.iter().any(|v| values_equal(v, value)),
                CmpOp::Eq => vals.iter().any(|v| values_equal(v, value)),
                _ => vals.iter().any(|v| comparable(v, value) && satisfies(*op, compare_bson(v, value))),
            }
        }
        Node::Regex { path, re } => leaf_values(doc, path)
            .iter()
            .any(|v| matches!(v, Bson::String(s) if re.is_match(s))),
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let va = resolve_path(a, &s.field).into_iter().next();
        let vb = resolve_path(b, &s.field).into_iter().next();
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn satisfies(op: CmpOp, ord: Ordering) -> bool {
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Gte => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Lte => ord != Ordering::Greater,
    }
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|x| values_equal(v, x))
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || type_rank(a) == type_rank(b)
}

/// Resolves a dotted path, descending through sub-documents and arrays of sub-documents.
/// `characteristics.key` on `{characteristics: [{key: "a"}, {key: "b"}]}` yields both keys.
pub fn resolve_path<'a>(doc: &'a BsonDocument, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    if path.is_empty() || path.len() > 1024 {
        return out;
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() > MAX_PATH_DEPTH {
        return out;
    }
    if let Some(v) = doc.get(parts[0]) {
        walk(v, &parts[1..], &mut out);
    }
    out
}

fn walk<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Bson::Document(d) => {
            if let Some(v) = d.get(*head) {
                walk(v, tail, out);
            }
        }
        Bson::Array(items) => {
            for item in items {
                if let Bson::Document(_) = item {
                    walk(item, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Resolved values with arrays at the leaf expanded into their elements.
fn leaf_values<'a>(doc: &'a BsonDocument, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    for v in resolve_path(doc, path) {
        if let Bson::Array(items) = v {
            out.extend(items.iter());
        }
        out.push(v);
    }
    out
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn as_i64_num(x: &Bson) -> Option<i64> {
    match x {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    // Integers compare exactly; f64 only once a Double or Decimal128 is involved.
    if let (Some(x), Some(y)) = (as_i64_num(a), as_i64_num(b)) {
        return x.cmp(&y);
    }
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Numbers share one rank so mixed integer widths sort together.
fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}
