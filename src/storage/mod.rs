mod memory;

pub use memory::MemoryStore;

use bson::Document as BsonDocument;

use crate::errors::DbError;
use crate::query::{Filter, FindOptions};

/// The document store a repository reads from.
///
/// Every call may fail; the caller does not distinguish failure kinds beyond their message.
pub trait DocumentStore: Send + Sync {
    /// Cheap, possibly stale size of the whole collection.
    fn estimated_count(&self, collection: &str) -> Result<u64, DbError>;

    /// Exact number of documents matching `filter`.
    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError>;

    /// Matching documents after sort, skip and limit.
    fn find(&self, collection: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>, DbError>;
}
