// Window Functions
//
// Evaluation of `fn(...) OVER (PARTITION BY ... ORDER BY ...)` over a row stream.

pub mod evaluator;
pub mod function;
pub mod ordering;
pub mod partition;

use crate::query::executor::expression_eval::RowExpression;

pub use evaluator::WindowBatchIterator;
pub use function::{window_function, RowNumber, WindowFunction};
pub use ordering::{OrderBy, RowComparator};
pub use partition::PartitionBy;

/// The OVER clause of a window function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDefinition {
    pub partition_by: Vec<RowExpression>,
    pub order_by: Vec<OrderBy>,
}

impl WindowDefinition {
    pub fn new(partition_by: Vec<RowExpression>, order_by: Vec<OrderBy>) -> Self {
        Self { partition_by, order_by }
    }
}
