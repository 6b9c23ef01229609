// Query Executor Module
//
// Pull-based execution stages and the values, rows and errors flowing between them.

pub mod batch_iterator;
pub mod collect;
pub mod expression_eval;
pub mod ram_accounting;
pub mod result;
pub mod sources;
pub mod window;

// Export key types
pub use self::batch_iterator::{collect_rows, execute_query, BatchIterator, BatchLoad, LoadOutcome, MoveNext};
pub use self::collect::{ColumnReference, ColumnarScanIterator};
pub use self::ram_accounting::RamAccountingContext;
pub use self::result::{DataValue, QueryError, QueryResult, Row};
pub use self::window::{WindowBatchIterator, WindowDefinition};
