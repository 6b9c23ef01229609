// Bayun Execution Core

pub mod common;
pub mod query;
pub mod storage;

// Re-export key items for convenient access
pub use common::config::{ExecutionConfig, NullOrdering};
pub use query::executor::batch_iterator::{collect_rows, execute_query, BatchIterator, BatchLoad, LoadOutcome, MoveNext};
pub use query::executor::collect::{ColumnReference, ColumnarScanIterator};
pub use query::executor::ram_accounting::RamAccountingContext;
pub use query::executor::result::{DataValue, QueryError, QueryResult, Row};
pub use query::executor::window::{WindowBatchIterator, WindowDefinition};
pub use storage::index::{IndexReader, IndexSearcher, IndexWriter, Query};
