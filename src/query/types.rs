use bson::Bson;
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
// Same bound document stores put on a regex pattern.
pub(crate) const MAX_REGEX_LEN: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: Order) -> Self {
        Self { field: field.into(), order }
    }
}

/// Options for `DocumentStore::find`.
///
/// `limit: None` means no limit. An empty sort keeps the store's natural order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, pattern: String, case_insensitive: bool },
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    pub fn regex(path: impl Into<String>, pattern: impl Into<String>, case_insensitive: bool) -> Self {
        Self::Regex { path: path.into(), pattern: pattern.into(), case_insensitive }
    }

    /// Conjunction that collapses the trivial cases: no clause is `True`, one clause is itself.
    #[must_use]
    pub fn all(mut clauses: Vec<Filter>) -> Self {
        match clauses.len() {
            0 => Self::True,
            1 => clauses.remove(0),
            _ => Self::And(clauses),
        }
    }

    /// Disjunction with the same collapsing rules as [`Filter::all`].
    #[must_use]
    pub fn any(mut clauses: Vec<Filter>) -> Self {
        match clauses.len() {
            0 => Self::True,
            1 => clauses.remove(0),
            _ => Self::Or(clauses),
        }
    }
}
