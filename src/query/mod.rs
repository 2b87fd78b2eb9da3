// Submodules for separation of concerns
mod eval;
mod parse;
mod types;

// Public API re-exports
pub use eval::{CompiledFilter, compare_bson, compare_docs, eval_filter, resolve_path};
pub use parse::{FilterSerde, parse_filter_json, parse_filters_json};
pub use types::{CmpOp, Filter, FindOptions, Order, SortSpec};
