use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{debug, info};

use crate::common::types::{DocId, Score, ScoredDoc, SegmentOrd};
use crate::storage::index::writer::SEGMENT_FILE_EXTENSION;
use crate::storage::index::{IndexError, Query, Segment};

/// A point-in-time view over a list of segments.
///
/// Clones share the closed flag: closing any clone closes the reader for all.
#[derive(Debug, Clone)]
pub struct IndexReader {
    segments: Arc<Vec<Arc<Segment>>>,
    closed: Arc<AtomicBool>,
}

impl IndexReader {
    pub fn new(segments: Vec<Arc<Segment>>) -> Self {
        Self {
            segments: Arc::new(segments),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load every persisted segment in `dir`, in file name order
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == SEGMENT_FILE_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut segments = Vec::with_capacity(paths.len());
        for path in &paths {
            let mut reader = BufReader::new(File::open(path)?);
            segments.push(Arc::new(Segment::read_from(&mut reader)?));
        }
        info!("Opened {} segments from {}", segments.len(), dir.display());
        Ok(Self::new(segments))
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Live documents across all segments
    pub fn num_docs(&self) -> usize {
        self.segments.iter().map(|s| s.num_live_docs()).sum()
    }

    pub fn segment(&self, ord: SegmentOrd) -> Result<&Arc<Segment>, IndexError> {
        if self.is_closed() {
            return Err(IndexError::ReaderClosed);
        }
        self.segments.get(ord).ok_or(IndexError::SegmentOutOfRange(ord))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Hands out reader handles and counts how many are still open
#[derive(Debug, Clone)]
pub struct IndexSearcher {
    reader: IndexReader,
    open_handles: Arc<AtomicUsize>,
}

impl IndexSearcher {
    pub fn new(reader: IndexReader) -> Self {
        Self {
            reader,
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn acquire(&self) -> SearcherHandle {
        self.open_handles.fetch_add(1, Ordering::AcqRel);
        SearcherHandle {
            reader: self.reader.clone(),
            open_handles: Arc::clone(&self.open_handles),
            released: false,
        }
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }
}

/// An acquired reference to a searcher's reader; released exactly once
#[derive(Debug)]
pub struct SearcherHandle {
    reader: IndexReader,
    open_handles: Arc<AtomicUsize>,
    released: bool,
}

impl SearcherHandle {
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    /// Start a document-ordered scan for `query`
    pub fn scan(&self, query: Query, needs_scores: bool, min_score: Option<Score>) -> DocScan {
        DocScan::new(self.reader.clone(), query, needs_scores, min_score)
    }

    /// Returns false if the handle was already released
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.open_handles.fetch_sub(1, Ordering::AcqRel);
        true
    }
}

impl Drop for SearcherHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Enumerates matching live documents in segment order, then doc id order
#[derive(Debug)]
pub struct DocScan {
    reader: IndexReader,
    query: Query,
    needs_scores: bool,
    min_score: Option<Score>,
    segment: SegmentOrd,
    doc: DocId,
    finished: bool,
}

impl DocScan {
    /// Scores are computed when `needs_scores` is set or a `min_score` applies
    pub fn new(reader: IndexReader, query: Query, needs_scores: bool, min_score: Option<Score>) -> Self {
        Self {
            reader,
            query,
            needs_scores: needs_scores || min_score.is_some(),
            min_score,
            segment: 0,
            doc: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Up to `max` next matching positions. An empty batch means the scan is finished.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<ScoredDoc>, IndexError> {
        let mut batch = Vec::with_capacity(max.min(1024));
        while batch.len() < max && !self.finished {
            if self.segment >= self.reader.num_segments() {
                self.finished = true;
                break;
            }
            let segment = self.reader.segment(self.segment)?;
            if self.doc >= segment.max_doc() {
                self.segment += 1;
                self.doc = 0;
                continue;
            }

            let doc = self.doc;
            self.doc += 1;
            if !segment.is_live(doc) {
                continue;
            }
            let Some(score) = self.query.score(segment, doc) else {
                continue;
            };
            if self.min_score.is_some_and(|min| score < min) {
                continue;
            }
            let score = self.needs_scores.then_some(score);
            batch.push(ScoredDoc::new(self.segment, doc, score));
        }
        debug!("Scan batch of {} docs (segment {}, finished: {})", batch.len(), self.segment, self.finished);
        Ok(batch)
    }
}
