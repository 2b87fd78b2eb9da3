//! Turns one [`Search`] into at most one store predicate.

use crate::model::{Search, SearchMode};
use crate::query::Filter;

/// The predicate shape a search resolves to, before it is bound to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    /// Exact equality against a boolean literal.
    Boolean(bool),
    /// Case-insensitive pattern anywhere in the value; holds the raw, untrimmed pattern.
    Contains(String),
    /// Case-sensitive, left-anchored pattern; holds the trimmed value without the anchor.
    Prefix(String),
}

impl SearchKind {
    /// `None` for an empty or blank value.
    ///
    /// A `true`/`false` literal (any case, surrounding blanks ignored) always wins over `mode`.
    #[must_use]
    pub fn classify(mode: SearchMode, value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(Self::Boolean(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(Self::Boolean(false));
        }
        Some(match mode {
            SearchMode::Regex => Self::Contains(value.to_owned()),
            SearchMode::Prefix | SearchMode::ExactMatch => Self::Prefix(trimmed.to_owned()),
        })
    }

    #[must_use]
    pub fn into_filter(self, field_path: &str) -> Filter {
        match self {
            Self::Boolean(b) => Filter::eq(field_path, b),
            Self::Contains(pattern) => Filter::regex(field_path, pattern, true),
            // Anchored and case-sensitive so an ascending index stays usable.
            Self::Prefix(value) => Filter::regex(field_path, format!("^{value}"), false),
        }
    }
}

/// Predicate for `search` on `field_path`, or `None` when the search is empty.
///
/// Patterns are passed through unvalidated; a bad one is reported by the store at query time.
#[must_use]
pub fn evaluate(field_path: &str, search: &Search) -> Option<Filter> {
    SearchKind::classify(search.search_mode, &search.value).map(|kind| kind.into_filter(field_path))
}
