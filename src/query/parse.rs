use crate::errors::DbError;
use bson::Bson;
use serde::{Deserialize, Serialize};

use super::types::{CmpOp, Filter};

// Serde-facing structures for safe JSON parsing of filters.
// Variant order matters for the untagged match: operator-specific shapes come before `Cmp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSerde {
    And {
        #[serde(rename = "$and")]
        and: Vec<FilterSerde>,
    },
    Or {
        #[serde(rename = "$or")]
        or: Vec<FilterSerde>,
    },
    Not {
        #[serde(rename = "$not")]
        not: Box<FilterSerde>,
    },
    Exists {
        field: String,
        #[serde(rename = "$exists")]
        exists: bool,
    },
    In {
        field: String,
        #[serde(rename = "$in")]
        in_vals: Vec<Bson>,
    },
    Nin {
        field: String,
        #[serde(rename = "$nin")]
        nin_vals: Vec<Bson>,
    },
    Regex {
        field: String,
        #[serde(rename = "$regex")]
        pattern: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    Cmp {
        field: String,
        #[serde(default, rename = "$eq")]
        eq: Option<Bson>,
        #[serde(default, rename = "$ne")]
        ne: Option<Bson>,
        #[serde(default, rename = "$gt")]
        gt: Option<Bson>,
        #[serde(default, rename = "$gte")]
        gte: Option<Bson>,
        #[serde(default, rename = "$lt")]
        lt: Option<Bson>,
        #[serde(default, rename = "$lte")]
        lte: Option<Bson>,
    },
    True(bool),
}

impl TryFrom<FilterSerde> for Filter {
    type Error = DbError;
    fn try_from(fs: FilterSerde) -> Result<Self, Self::Error> {
        use FilterSerde as FS;
        Ok(match fs {
            FS::And { and } => {
                Self::And(and.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Or { or } => {
                Self::Or(or.into_iter().map(Self::try_from).collect::<Result<_, _>>()?)
            }
            FS::Not { not } => Self::Not(Box::new(Self::try_from(*not)?)),
            FS::Exists { field, exists } => Self::Exists { path: field, exists },
            FS::In { field, in_vals } => Self::In { path: field, values: in_vals },
            FS::Nin { field, nin_vals } => Self::Nin { path: field, values: nin_vals },
            FS::Regex { field, pattern, case_insensitive } => {
                Self::Regex { path: field, pattern, case_insensitive }
            }
            FS::Cmp { field, eq, ne, gt, gte, lt, lte } => {
                let (op, value) = if let Some(v) = eq {
                    (CmpOp::Eq, v)
                } else if let Some(v) = ne {
                    (CmpOp::Ne, v)
                } else if let Some(v) = gt {
                    (CmpOp::Gt, v)
                } else if let Some(v) = gte {
                    (CmpOp::Gte, v)
                } else if let Some(v) = lt {
                    (CmpOp::Lt, v)
                } else if let Some(v) = lte {
                    (CmpOp::Lte, v)
                } else {
                    return Err(DbError::QueryError(format!(
                        "no comparison operator provided for '{field}'"
                    )));
                };
                Self::Cmp { path: field, op, value }
            }
            FS::True(b) => {
                if b {
                    Self::True
                } else {
                    Self::Not(Box::new(Self::True))
                }
            }
        })
    }
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a filter structure.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let fs: FilterSerde = serde_json::from_str(json)?;
    Filter::try_from(fs)
}

/// Parses either a single filter object or a JSON array of them.
///
/// # Errors
/// Returns an error if any element fails to parse.
pub fn parse_filters_json(json: &str) -> Result<Vec<Filter>, DbError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .map(|v| Filter::try_from(serde_json::from_value::<FilterSerde>(v)?))
        .collect()
}
