//! Builds the filter for a request from its searches plus caller-supplied criteria.

use crate::errors::DbError;
use crate::model::{Column, TablesInput};
use crate::query::{Filter, parse_filters_json};
use crate::search;

/// Caller-supplied predicates combined conjunctively with the generated ones.
///
/// Built from any mix of present and absent entries; absent ones are dropped on the way in,
/// so a collection of only `None`s is the same as no criteria at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Vec<Filter>);

impl Criteria {
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// One filter object or a JSON array of them, in the query JSON syntax.
    ///
    /// # Errors
    /// Returns an error when the JSON does not describe filters.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        Ok(Self(parse_filters_json(json)?))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.0.iter()
    }

    pub fn push(&mut self, filter: impl Into<Option<Filter>>) {
        if let Some(f) = filter.into() {
            self.0.push(f);
        }
    }
}

impl From<Filter> for Criteria {
    fn from(f: Filter) -> Self {
        Self(vec![f])
    }
}

impl From<Option<Filter>> for Criteria {
    fn from(f: Option<Filter>) -> Self {
        f.into_iter().collect()
    }
}

impl From<Vec<Filter>> for Criteria {
    fn from(v: Vec<Filter>) -> Self {
        Self(v)
    }
}

impl From<Vec<Option<Filter>>> for Criteria {
    fn from(v: Vec<Option<Filter>>) -> Self {
        v.into_iter().collect()
    }
}

impl FromIterator<Option<Filter>> for Criteria {
    fn from_iter<I: IntoIterator<Item = Option<Filter>>>(iter: I) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

impl FromIterator<Filter> for Criteria {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Criteria {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One predicate per searchable column for the global search value.
#[must_use]
pub fn global_criteria(input: &TablesInput) -> Vec<Filter> {
    input
        .columns
        .iter()
        .filter(|c| c.searchable)
        .filter_map(|c| search::evaluate(&c.data, &input.search))
        .collect()
}

/// The column's own search, when the column accepts one and its value is not blank.
#[must_use]
pub fn column_criteria(column: &Column) -> Option<Filter> {
    if column.searchable || column.searchable_independently {
        search::evaluate(&column.data, &column.search)
    } else {
        None
    }
}

/// Global search (any column), then every column search, additional criteria, pre-filter criteria.
#[must_use]
pub fn build_filter(input: &TablesInput, additional: &Criteria, pre_filter: &Criteria) -> Filter {
    let mut clauses = Vec::new();
    let global = global_criteria(input);
    if !global.is_empty() {
        clauses.push(Filter::any(global));
    }
    clauses.extend(input.columns.iter().filter_map(column_criteria));
    clauses.extend(additional.iter().cloned());
    clauses.extend(pre_filter.iter().cloned());
    Filter::all(clauses)
}

/// Filter for the "total" count: pre-filter criteria only.
#[must_use]
pub fn build_count_filter(pre_filter: &Criteria) -> Filter {
    Filter::all(pre_filter.iter().cloned().collect())
}
