// Collect Module
//
// Reading rows out of the columnar index.

pub mod column_reference;
pub mod columnar_scan;

pub use column_reference::{ColumnReference, ColumnSource, DOC_ID_COLUMN, SCORE_COLUMN};
pub use columnar_scan::ColumnarScanIterator;
