pub mod config;
pub mod criteria;
pub mod errors;
pub mod logger;
pub mod model;
pub mod query;
pub mod repository;
pub mod search;
pub mod sort;
pub mod storage;
pub mod utils;

pub use crate::config::TablesConfig;
pub use crate::criteria::Criteria;
pub use crate::errors::DbError;
pub use crate::model::{Column, Direction, Search, SearchMode, SortOrder, TablesInput, TablesOutput};
pub use crate::repository::TablesRepository;
pub use crate::storage::{DocumentStore, MemoryStore};
