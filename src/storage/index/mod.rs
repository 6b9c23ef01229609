// Columnar Index
//
// A small segmented column store: the writer buffers documents into immutable
// segments, a reader is a snapshot of segments, and a searcher scans a reader in
// document order for a query.

pub mod query;
pub mod searcher;
pub mod segment;
pub mod writer;

use thiserror::Error;

pub use query::Query;
pub use searcher::{DocScan, IndexReader, IndexSearcher, SearcherHandle};
pub use segment::{ColumnValues, Segment, ValueKind};
pub use writer::{IndexWriter, IndexWriterConfig};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Corrupt segment: {0}")]
    CorruptSegment(String),

    #[error("Field '{field}' holds {expected:?} values, got {found}")]
    TypeMismatch {
        field: String,
        expected: ValueKind,
        found: &'static str,
    },

    #[error("Index reader is closed")]
    ReaderClosed,

    #[error("Segment {0} does not exist")]
    SegmentOutOfRange(usize),
}
