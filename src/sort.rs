//! Maps grid sort directives to store sort keys.

use crate::model::{Direction, SortOrder, TablesInput};
use crate::query::{Order, SortSpec};

/// Store ordering for the request's sort directives, primary key first.
///
/// Directives pointing past the last column or at a non-orderable column are dropped silently.
/// An empty result leaves the store's natural order in place.
#[must_use]
pub fn resolve(input: &TablesInput) -> Vec<SortSpec> {
    input.order.iter().filter_map(|o| to_sort_spec(input, o)).collect()
}

fn to_sort_spec(input: &TablesInput, order: &SortOrder) -> Option<SortSpec> {
    let column = input.columns.get(order.column).filter(|c| c.orderable)?;
    let dir = match order.dir {
        Direction::Asc => Order::Asc,
        Direction::Desc => Order::Desc,
    };
    Some(SortSpec::new(column.data.clone(), dir))
}
