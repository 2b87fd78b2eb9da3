use serde::{Deserialize, Serialize};

/// Reply to one [`TablesInput`](super::TablesInput). Failures are carried in `error`, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesOutput<T> {
    pub draw: u32,
    /// Rows in the collection before request filtering (pre-filter criteria still apply).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_total: Option<u64>,
    /// Rows matching every filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_filtered: Option<u64>,
    /// Rows exist after this page.
    #[serde(default)]
    pub has_more: bool,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> TablesOutput<T> {
    #[must_use]
    pub fn new(draw: u32) -> Self {
        Self { draw, records_total: None, records_filtered: None, has_more: false, data: Vec::new(), error: None }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts every row, keeping the counters, draw token and error.
    pub fn map_rows<R, F>(self, f: F) -> TablesOutput<R>
    where
        F: FnMut(T) -> R,
    {
        TablesOutput {
            draw: self.draw,
            records_total: self.records_total,
            records_filtered: self.records_filtered,
            has_more: self.has_more,
            data: self.data.into_iter().map(f).collect(),
            error: self.error,
        }
    }
}
