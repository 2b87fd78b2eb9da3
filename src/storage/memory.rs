use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::time::{Duration, Instant};

use super::DocumentStore;
use crate::errors::DbError;
use crate::query::{CompiledFilter, Filter, FindOptions, compare_docs};
use crate::utils::devlog::elapsed_ms;

/// In-process document store keeping each collection in insertion order.
///
/// Natural order (no sort) is insertion order. Regex patterns are compiled per query,
/// so an invalid pattern fails the call instead of silently matching nothing.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<BsonDocument>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection; returns false if it already existed.
    pub fn create_collection(&self, name: &str) -> bool {
        let mut cols = self.collections.write();
        if cols.contains_key(name) {
            return false;
        }
        cols.insert(name.to_string(), Vec::new());
        true
    }

    /// Appends a document, creating the collection on first use.
    /// Documents without `_id` get a fresh `ObjectId`. Returns the document's `_id`.
    pub fn insert(&self, collection: &str, mut doc: BsonDocument) -> Bson {
        let id = ensure_id(&mut doc);
        self.collections.write().entry(collection.to_string()).or_default().push(doc);
        id
    }

    /// Appends every document under one write lock. Returns how many were added.
    pub fn insert_many<I>(&self, collection: &str, docs: I) -> usize
    where
        I: IntoIterator<Item = BsonDocument>,
    {
        let mut cols = self.collections.write();
        let target = cols.entry(collection.to_string()).or_default();
        let before = target.len();
        target.extend(docs.into_iter().map(|mut d| {
            ensure_id(&mut d);
            d
        }));
        target.len() - before
    }

    /// Loads newline-delimited JSON objects into `collection`. Blank lines are skipped.
    ///
    /// # Errors
    /// Returns an error on read failure or on the first line that is not a JSON object;
    /// nothing is inserted then.
    pub fn load_ndjson<R: Read>(&self, collection: &str, reader: R) -> Result<usize, DbError> {
        let mut reader = BufReader::new(reader);
        let mut buf = String::with_capacity(8 * 1024);
        let mut line_no = 0usize;
        let mut docs = Vec::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            line_no += 1;
            let line = buf.trim();
            if line.is_empty() {
                continue;
            }
            let doc: BsonDocument = serde_json::from_str(line)
                .map_err(|e| DbError::Io(format!("line {line_no}: {e}")))?;
            docs.push(doc);
        }
        let inserted = self.insert_many(collection, docs);
        log::info!("loaded {inserted} documents into '{collection}'");
        Ok(inserted)
    }

    fn with_collection<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&[BsonDocument]) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let cols = self.collections.read();
        let docs = cols.get(collection).ok_or_else(|| DbError::NoSuchCollection(collection.to_string()))?;
        f(docs)
    }
}

fn ensure_id(doc: &mut BsonDocument) -> Bson {
    if !doc.contains_key("_id") {
        doc.insert("_id", ObjectId::new());
    }
    doc.get("_id").cloned().unwrap_or(Bson::Null)
}

struct Deadline {
    at: Option<Instant>,
    ms: u64,
}

impl Deadline {
    fn new(timeout_ms: Option<u64>) -> Self {
        Self {
            at: timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
            ms: timeout_ms.unwrap_or(0),
        }
    }

    fn check(&self) -> Result<(), DbError> {
        match self.at {
            Some(at) if Instant::now() >= at => Err(DbError::Timeout(self.ms)),
            _ => Ok(()),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn estimated_count(&self, collection: &str) -> Result<u64, DbError> {
        self.with_collection(collection, |docs| Ok(docs.len() as u64))
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        let compiled = CompiledFilter::compile(filter)?;
        let start = Instant::now();
        let n = self.with_collection(collection, |docs| Ok(docs.iter().filter(|d| compiled.matches(d)).count()))?;
        crate::devlog!({
            "bench": "store", "op": "count", "collection": collection,
            "duration_ms": elapsed_ms(start), "result_count": n,
        });
        Ok(n as u64)
    }

    fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError> {
        let compiled = CompiledFilter::compile(filter)?;
        let deadline = Deadline::new(opts.timeout_ms);
        let start = Instant::now();
        let mut docs = self.with_collection(collection, |docs| {
            let mut out = Vec::new();
            for d in docs {
                deadline.check()?;
                if compiled.matches(d) {
                    out.push(d.clone());
                }
            }
            Ok(out)
        })?;

        if let Some(sort) = opts.sort.as_deref()
            && !sort.is_empty()
        {
            // Stable, so ties keep insertion order.
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }

        let skip = usize::try_from(opts.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = opts.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let docs: Vec<BsonDocument> = docs.into_iter().skip(skip).take(limit).collect();
        crate::devlog!({
            "bench": "store", "op": "find", "collection": collection,
            "duration_ms": elapsed_ms(start), "result_count": docs.len(),
            "limit": opts.limit, "skip": opts.skip,
        });
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Order, SortSpec};
    use bson::doc;

    fn store() -> MemoryStore {
        let s = MemoryStore::new();
        s.insert("u_find", doc! {"k": 1, "v": 3, "x": 0});
        s.insert("u_find", doc! {"k": 2, "v": 1, "x": 0});
        s.insert("u_find", doc! {"k": 3, "v": 2, "x": 1});
        s
    }

    #[test]
    fn insert_assigns_object_id_once() {
        let s = MemoryStore::new();
        let id = s.insert("c", doc! {"a": 1});
        assert!(matches!(id, Bson::ObjectId(_)));
        let kept = s.insert("c", doc! {"_id": 7, "a": 2});
        assert_eq!(kept, Bson::Int32(7));
        assert_eq!(s.estimated_count("c").unwrap(), 2);
    }

    #[test]
    fn find_sort_and_pagination() {
        let s = store();
        let opts = FindOptions {
            sort: Some(vec![SortSpec::new("v", Order::Asc)]),
            limit: Some(2),
            skip: Some(1),
            timeout_ms: None,
        };
        let docs = s.find("u_find", &Filter::True, &opts).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get_i32("k").unwrap(), 3);
        assert_eq!(docs[1].get_i32("k").unwrap(), 1);
    }

    #[test]
    fn natural_order_is_insertion_order() {
        let s = store();
        let docs = s.find("u_find", &Filter::eq("x", 0), &FindOptions::default()).unwrap();
        let ks: Vec<i32> = docs.iter().map(|d| d.get_i32("k").unwrap()).collect();
        assert_eq!(ks, vec![1, 2]);
        assert_eq!(s.count("u_find", &Filter::eq("x", 0)).unwrap(), 2);
    }

    #[test]
    fn skip_past_end_is_empty() {
        let s = store();
        let opts = FindOptions { skip: Some(10), ..FindOptions::default() };
        assert!(s.find("u_find", &Filter::True, &opts).unwrap().is_empty());
    }

    #[test]
    fn unknown_collection_and_bad_regex_fail() {
        let s = store();
        assert!(matches!(s.estimated_count("nope"), Err(DbError::NoSuchCollection(_))));
        let bad = Filter::regex("k", "([", true);
        assert!(matches!(s.count("u_find", &bad), Err(DbError::QueryError(_))));
        assert!(s.find("u_find", &bad, &FindOptions::default()).is_err());
    }

    #[test]
    fn zero_timeout_fails_the_scan() {
        let s = store();
        let opts = FindOptions { timeout_ms: Some(0), ..FindOptions::default() };
        assert!(matches!(s.find("u_find", &Filter::True, &opts), Err(DbError::Timeout(0))));
    }

    #[test]
    fn load_ndjson_skips_blank_lines() {
        let s = MemoryStore::new();
        let input = "{\"label\":\"a\"}\n\n{\"label\":\"b\",\"nested\":{\"k\":1}}\n";
        assert_eq!(s.load_ndjson("p", input.as_bytes()).unwrap(), 2);
        assert_eq!(s.estimated_count("p").unwrap(), 2);
        assert!(s.load_ndjson("p", "not json\n".as_bytes()).is_err());
    }

    #[test]
    fn create_collection_and_insert_many() {
        let s = MemoryStore::new();
        assert!(s.create_collection("a"));
        assert!(!s.create_collection("a"));
        assert_eq!(s.insert_many("a", vec![doc! {"x": 1}, doc! {"_id": "keep", "x": 2}]), 2);
        let docs = s.find("a", &Filter::True, &FindOptions::default()).unwrap();
        assert!(matches!(docs[0].get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(docs[1].get_str("_id").unwrap(), "keep");
    }

    #[test]
    fn bad_ndjson_line_inserts_nothing() {
        let s = MemoryStore::new();
        assert!(s.load_ndjson("p", "{\"a\":1}\nnot json\n".as_bytes()).is_err());
        assert!(matches!(s.estimated_count("p"), Err(DbError::NoSuchCollection(_))));
    }
}
