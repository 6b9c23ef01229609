/// Document id inside a single segment
pub type DocId = u32;

/// Position of a segment inside an index reader
pub type SegmentOrd = usize;

/// Relevance score of a matching document
pub type Score = f32;

/// Fixed per-row overhead charged on top of the value sizes
pub const ROW_OVERHEAD_BYTES: usize = 24;

/// Size charged for a NULL or any fixed-width value
pub const FIXED_VALUE_BYTES: usize = 16;

/// Magic number at the start of every segment file ("BYSG")
pub const SEGMENT_MAGIC: u32 = 0x4259_5347;

/// Current segment file format version
pub const SEGMENT_FORMAT_VERSION: u16 = 1;

/// Size of the segment file header: magic (4) + version (2) + payload length (8)
pub const SEGMENT_HEADER_SIZE: usize = 14;

/// A position of a document in document order: segment first, then doc id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub segment: SegmentOrd,
    pub doc: DocId,
    /// `None` when scores were not requested
    pub score: Option<Score>,
}

impl ScoredDoc {
    pub fn new(segment: SegmentOrd, doc: DocId, score: Option<Score>) -> Self {
        Self { segment, doc, score }
    }
}
