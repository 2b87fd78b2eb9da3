use serde::{Deserialize, Serialize};

use crate::errors::DbError;

/// One server-side processing request as sent by a DataTables-style grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TablesInput {
    /// Draw counter, echoed back unchanged so the client can discard out-of-sequence replies.
    pub draw: u32,
    /// Zero-based offset of the first row.
    pub start: u64,
    /// Page size. `-1` requests every matching row; `0` requests nothing.
    pub length: i64,
    /// Global search, applied to every column with `searchable == true`.
    pub search: Search,
    /// Skip both count queries and leave `recordsTotal`/`recordsFiltered` out of the reply.
    pub counting_records_disabled: bool,
    pub columns: Vec<Column>,
    pub order: Vec<SortOrder>,
}

impl Default for TablesInput {
    fn default() -> Self {
        Self {
            draw: 1,
            start: 0,
            length: 10,
            search: Search::default(),
            counting_records_disabled: false,
            columns: Vec::new(),
            order: Vec::new(),
        }
    }
}

impl TablesInput {
    #[must_use]
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self { columns, ..Self::default() }
    }

    /// First column whose field path equals `data`.
    #[must_use]
    pub fn column(&self, data: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.data == data)
    }

    pub fn column_mut(&mut self, data: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.data == data)
    }

    /// Structural checks a well-formed request must pass.
    ///
    /// Out-of-range or non-orderable sort directives are not errors; they are dropped later.
    ///
    /// # Errors
    /// Returns `DbError::InvalidRequest` naming the first violation.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.length < -1 {
            return Err(DbError::InvalidRequest(format!("length must be >= -1, got {}", self.length)));
        }
        if self.columns.is_empty() {
            return Err(DbError::InvalidRequest("columns must not be empty".into()));
        }
        if let Some(idx) = self.columns.iter().position(|c| c.data.trim().is_empty()) {
            return Err(DbError::InvalidRequest(format!("column {idx} has a blank data path")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Column {
    /// Field path in the stored document, dotted for sub-documents.
    pub data: String,
    pub name: Option<String>,
    pub searchable: bool,
    /// Apply this column's own search even when `searchable` is false.
    /// Such a column stays out of the global search.
    pub searchable_independently: bool,
    pub orderable: bool,
    pub search: Search,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            data: String::new(),
            name: None,
            searchable: true,
            searchable_independently: false,
            orderable: true,
            search: Search::default(),
        }
    }
}

impl Column {
    /// A searchable, orderable column with an empty search.
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Search {
    /// Empty or blank means "no filter".
    pub value: String,
    pub search_mode: SearchMode,
}

impl Search {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), search_mode: SearchMode::Prefix }
    }

    #[must_use]
    pub fn with_mode(value: impl Into<String>, search_mode: SearchMode) -> Self {
        Self { value: value.into(), search_mode }
    }

    #[must_use]
    pub fn regex(value: impl Into<String>) -> Self {
        Self::with_mode(value, SearchMode::Regex)
    }
}

/// How a [`Search`] value is turned into a predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchMode {
    /// Case-sensitive `^value` match on the trimmed value; can use an ascending index.
    #[default]
    Prefix,
    /// Case-insensitive match of the raw value anywhere in the field.
    Regex,
    /// Equality; only boolean literals are matched exactly, anything else falls back to prefix.
    ExactMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    /// Index into [`TablesInput::columns`].
    pub column: usize,
    pub dir: Direction,
}

impl SortOrder {
    #[must_use]
    pub fn new(column: usize, dir: Direction) -> Self {
        Self { column, dir }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}
