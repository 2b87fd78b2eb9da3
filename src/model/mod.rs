mod input;
mod output;

pub use input::{Column, Direction, Search, SearchMode, SortOrder, TablesInput};
pub use output::TablesOutput;
