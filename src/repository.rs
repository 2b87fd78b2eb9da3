//! Per-collection entry point that runs a [`TablesInput`] against a [`DocumentStore`].

use bson::Document as BsonDocument;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::criteria::{Criteria, build_count_filter, build_filter};
use crate::errors::DbError;
use crate::model::{TablesInput, TablesOutput};
use crate::query::FindOptions;
use crate::sort;
use crate::storage::DocumentStore;
use crate::utils::devlog::elapsed_ms;

/// Serves grid requests for one collection, decoding rows into `T`.
///
/// Holds no per-request state; share it freely across threads.
pub struct TablesRepository<S, T> {
    store: Arc<S>,
    collection: String,
    query_timeout_ms: Option<u64>,
    _row: PhantomData<fn() -> T>,
}

impl<S, T> Clone for TablesRepository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            query_timeout_ms: self.query_timeout_ms,
            _row: PhantomData,
        }
    }
}

impl<S, T> TablesRepository<S, T>
where
    S: DocumentStore,
    T: DeserializeOwned,
{
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self { store, collection: collection.into(), query_timeout_ms: None, _row: PhantomData }
    }

    /// Timeout forwarded to every fetch; a fetch that exceeds it becomes an `error` reply.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.query_timeout_ms = timeout_ms;
        self
    }

    pub fn find_all(&self, input: &TablesInput) -> TablesOutput<T> {
        self.find_all_converted(input, &Criteria::none(), &Criteria::none(), |row| row)
    }

    /// `additional` narrows the filtered count and the rows; `pre_filter` also narrows the total.
    pub fn find_all_with(&self, input: &TablesInput, additional: &Criteria, pre_filter: &Criteria) -> TablesOutput<T> {
        self.find_all_converted(input, additional, pre_filter, |row| row)
    }

    /// Runs the request and maps every returned row through `converter`.
    ///
    /// Never fails: a store or decoding error is reported in `error` with no rows,
    /// keeping whatever counters were obtained before it.
    pub fn find_all_converted<R, F>(
        &self,
        input: &TablesInput,
        additional: &Criteria,
        pre_filter: &Criteria,
        mut converter: F,
    ) -> TablesOutput<R>
    where
        F: FnMut(T) -> R,
    {
        self.try_find_all_converted(input, additional, pre_filter, |row| Ok::<R, Infallible>(converter(row)))
    }

    /// Like [`Self::find_all_converted`] for conversions that can fail.
    ///
    /// The first `Err` ends the request: rows are dropped and `error` carries
    /// `Row conversion error: ` followed by the converter's message.
    pub fn try_find_all_converted<R, E, F>(
        &self,
        input: &TablesInput,
        additional: &Criteria,
        pre_filter: &Criteria,
        converter: F,
    ) -> TablesOutput<R>
    where
        E: Display,
        F: FnMut(T) -> Result<R, E>,
    {
        let mut output = TablesOutput::new(input.draw);
        if input.length == 0 {
            return output;
        }
        let started = Instant::now();
        match self.run(input, additional, pre_filter, converter, &mut output) {
            Ok(()) => log::debug!(
                "'{}' draw {}: {} rows, has_more={}",
                self.collection,
                input.draw,
                output.data.len(),
                output.has_more
            ),
            Err(e) => {
                log::warn!("'{}' draw {} failed: {e}", self.collection, input.draw);
                output.data = Vec::new();
                output.error = Some(e.to_string());
            }
        }
        crate::devlog!({
            "bench": "tables", "collection": self.collection, "draw": input.draw,
            "duration_ms": elapsed_ms(started),
            "records_total": output.records_total, "records_filtered": output.records_filtered,
            "rows": output.data.len(), "has_more": output.has_more, "error": output.error.is_some(),
        });
        output
    }

    fn run<R, E, F>(
        &self,
        input: &TablesInput,
        additional: &Criteria,
        pre_filter: &Criteria,
        mut converter: F,
        output: &mut TablesOutput<R>,
    ) -> Result<(), DbError>
    where
        E: Display,
        F: FnMut(T) -> Result<R, E>,
    {
        input.validate()?;
        // One extra row tells whether another page follows.
        let limit = u64::try_from(input.length).ok().map(|len| len + 1);

        if !input.counting_records_disabled {
            let total = self.count_total(pre_filter)?;
            log::debug!("'{}' draw {}: records_total={total}", self.collection, input.draw);
            output.records_total = Some(total);
            if total == 0 {
                return Ok(());
            }
            let filtered = self.store.count(&self.collection, &build_filter(input, additional, pre_filter))?;
            log::debug!("'{}' draw {}: records_filtered={filtered}", self.collection, input.draw);
            output.records_filtered = Some(filtered);
            if filtered == 0 {
                return Ok(());
            }
        }

        let sort = sort::resolve(input);
        let opts = FindOptions {
            sort: (!sort.is_empty()).then_some(sort),
            limit,
            skip: Some(input.start),
            timeout_ms: self.query_timeout_ms,
        };
        log::debug!("'{}' draw {}: fetching skip={} limit={:?}", self.collection, input.draw, input.start, limit);
        let mut docs = self.store.find(&self.collection, &build_filter(input, additional, pre_filter), &opts)?;

        output.has_more = match limit {
            Some(l) if docs.len() as u64 == l => {
                docs.pop();
                true
            }
            _ => false,
        };
        output.data = decode_rows::<T>(docs)?
            .into_iter()
            .map(|row| converter(row).map_err(|e| DbError::Conversion(e.to_string())))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn count_total(&self, pre_filter: &Criteria) -> Result<u64, DbError> {
        if pre_filter.is_empty() {
            self.store.estimated_count(&self.collection)
        } else {
            self.store.count(&self.collection, &build_count_filter(pre_filter))
        }
    }
}

fn decode_rows<T: DeserializeOwned>(docs: Vec<BsonDocument>) -> Result<Vec<T>, DbError> {
    docs.into_iter()
        .map(|d| bson::deserialize_from_document::<T>(d).map_err(|e| DbError::Conversion(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Direction, SortOrder};
    use crate::query::Filter;
    use crate::storage::MemoryStore;
    use bson::doc;
    use parking_lot::Mutex;

    /// Records every call and can be told to fail one operation.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryStore,
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ScriptedStore {
        fn record(&self, op: &str) -> Result<(), DbError> {
            self.calls.lock().push(op.to_string());
            match self.fail_on {
                Some(f) if f == op => Err(DbError::QueryError(format!("{op} refused"))),
                _ => Ok(()),
            }
        }
    }

    impl DocumentStore for ScriptedStore {
        fn estimated_count(&self, collection: &str) -> Result<u64, DbError> {
            self.record("estimated_count")?;
            self.inner.estimated_count(collection)
        }
        fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
            self.record("count")?;
            self.inner.count(collection, filter)
        }
        fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
            self.record("find")?;
            self.inner.find(collection, filter, opts)
        }
    }

    fn scripted(fail_on: Option<&'static str>) -> Arc<ScriptedStore> {
        let s = ScriptedStore { fail_on, ..ScriptedStore::default() };
        for (label, created) in [("A", 1), ("B", 3), ("C", 2)] {
            s.inner.insert("rows", doc! {"label": label, "createdAt": created});
        }
        Arc::new(s)
    }

    fn input(length: i64) -> TablesInput {
        let mut i = TablesInput::with_columns(vec![Column::new("label"), Column::new("createdAt")]);
        i.length = length;
        i
    }

    fn labels(out: &TablesOutput<BsonDocument>) -> Vec<String> {
        out.data.iter().map(|d| d.get_str("label").unwrap().to_string()).collect()
    }

    #[test]
    fn zero_length_issues_no_calls() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let mut i = input(0);
        i.draw = 9;
        i.columns.clear();
        let out = repo.find_all(&i);
        assert_eq!(out, TablesOutput::new(9));
        assert!(store.calls.lock().is_empty());
    }

    #[test]
    fn estimated_then_exact_then_find() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let out = repo.find_all(&input(10));
        assert_eq!(*store.calls.lock(), vec!["estimated_count", "count", "find"]);
        assert_eq!(out.records_total, Some(3));
        assert_eq!(out.records_filtered, Some(3));
        assert_eq!(labels(&out), vec!["A", "B", "C"]);
        assert!(!out.has_more);
    }

    #[test]
    fn pre_filter_uses_exact_total_count() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let pre: Criteria = vec![None, Some(Filter::Nin { path: "label".into(), values: vec!["A".into()] })].into();
        let out = repo.find_all_with(&input(10), &Criteria::none(), &pre);
        assert_eq!(*store.calls.lock(), vec!["count", "count", "find"]);
        assert_eq!(out.records_total, Some(2));
        assert_eq!(labels(&out), vec!["B", "C"]);
    }

    #[test]
    fn only_absent_pre_filters_use_estimate() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let pre: Criteria = vec![None::<Filter>, None].into();
        repo.find_all_with(&input(10), &Criteria::none(), &pre);
        assert_eq!(store.calls.lock()[0], "estimated_count");
    }

    #[test]
    fn counting_disabled_skips_counts() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let mut i = input(2);
        i.counting_records_disabled = true;
        let out = repo.find_all(&i);
        assert_eq!(*store.calls.lock(), vec!["find"]);
        assert_eq!(out.records_total, None);
        assert_eq!(out.records_filtered, None);
        assert_eq!(labels(&out), vec!["A", "B"]);
        assert!(out.has_more);
    }

    #[test]
    fn zero_filtered_stops_before_fetch() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store.clone(), "rows");
        let extra = Criteria::from(Filter::eq("label", "Z"));
        let out = repo.find_all_with(&input(10), &extra, &Criteria::none());
        assert_eq!(*store.calls.lock(), vec!["estimated_count", "count"]);
        assert_eq!(out.records_total, Some(3));
        assert_eq!(out.records_filtered, Some(0));
        assert!(out.data.is_empty());
        assert!(out.error.is_none());
    }

    #[test]
    fn fetch_failure_keeps_counts() {
        let store = scripted(Some("find"));
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store, "rows");
        let mut i = input(10);
        i.draw = 5;
        let out = repo.find_all(&i);
        assert_eq!(out.draw, 5);
        assert_eq!(out.records_total, Some(3));
        assert_eq!(out.records_filtered, Some(3));
        assert!(out.data.is_empty());
        assert_eq!(out.error.as_deref(), Some("Query error: find refused"));
    }

    #[test]
    fn sorted_lookahead_and_conversion() {
        let store = scripted(None);
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(store, "rows");
        let mut i = input(2);
        i.order = vec![SortOrder::new(1, Direction::Desc)];
        let out = repo.find_all_converted(&i, &Criteria::none(), &Criteria::none(), |d| {
            d.get_str("label").unwrap_or_default().to_lowercase()
        });
        assert_eq!(out.data, vec!["b", "c"]);
        assert!(out.has_more);
    }

    #[test]
    fn failing_converter_is_reported() {
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(scripted(None), "rows");
        let out = repo.try_find_all_converted(&input(10), &Criteria::none(), &Criteria::none(), |d| {
            match d.get_str("label") {
                Ok("B") => Err("label B not allowed".to_string()),
                Ok(l) => Ok(l.to_string()),
                Err(e) => Err(e.to_string()),
            }
        });
        assert_eq!(out.error.as_deref(), Some("Row conversion error: label B not allowed"));
        assert!(out.data.is_empty());
        assert_eq!(out.records_filtered, Some(3));
    }

    #[test]
    fn decode_failure_is_reported() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            missing_field: String,
        }
        let repo: TablesRepository<_, Strict> = TablesRepository::new(scripted(None), "rows");
        let out = repo.find_all(&input(10));
        assert!(out.error.as_deref().is_some_and(|e| e.starts_with("Row conversion error")));
        assert!(out.data.is_empty());
        assert_eq!(out.records_total, Some(3));
    }

    #[test]
    fn invalid_request_is_reported_not_raised() {
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(scripted(None), "rows");
        let mut i = input(10);
        i.columns.clear();
        let out = repo.find_all(&i);
        assert!(out.error.as_deref().is_some_and(|e| e.contains("columns must not be empty")));
    }

    #[test]
    fn emits_one_dev_line_per_request() {
        let cap = crate::utils::devlog::capture();
        let repo: TablesRepository<_, BsonDocument> = TablesRepository::new(scripted(None), "rows");
        repo.find_all(&input(1));
        let tables = cap.of_kind("tables");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["records_total"], 3);
        assert_eq!(tables[0]["has_more"], true);
        assert_eq!(cap.of_kind("store").len(), 2);
    }
}
