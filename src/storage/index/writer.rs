use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::common::config::ExecutionConfig;
use crate::common::types::DocId;
use crate::query::executor::result::DataValue;
use crate::storage::index::{ColumnValues, IndexError, IndexReader, Segment, ValueKind};

/// File extension of persisted segments
pub const SEGMENT_FILE_EXTENSION: &str = "seg";

/// Configuration for segment building
#[derive(Debug, Clone)]
pub struct IndexWriterConfig {
    /// Documents per segment before a flush
    pub max_docs_per_segment: usize,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        Self {
            max_docs_per_segment: 4096,
        }
    }
}

impl From<&ExecutionConfig> for IndexWriterConfig {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            max_docs_per_segment: config.max_docs_per_segment,
        }
    }
}

/// Builds segments from documents.
///
/// A field's type is fixed by the first non-null value written to it; later
/// values of another type are rejected.
pub struct IndexWriter {
    config: IndexWriterConfig,
    segments: Vec<Arc<Segment>>,
    field_kinds: HashMap<String, ValueKind>,
    pending_docs: DocId,
    pending_columns: BTreeMap<String, ColumnValues>,
}

impl IndexWriter {
    pub fn new(config: IndexWriterConfig) -> Self {
        Self {
            config,
            segments: Vec::new(),
            field_kinds: HashMap::new(),
            pending_docs: 0,
            pending_columns: BTreeMap::new(),
        }
    }

    /// Buffer a document. Fields not listed read as NULL.
    pub fn add_document(&mut self, fields: &[(&str, DataValue)]) -> Result<(), IndexError> {
        // Validate the whole document first so a rejected doc leaves no partial slots
        for (name, value) in fields {
            if let (Some(kind), Some(expected)) = (ValueKind::of(value), self.field_kinds.get(*name)) {
                if kind != *expected {
                    return Err(IndexError::TypeMismatch {
                        field: name.to_string(),
                        expected: *expected,
                        found: value.type_name(),
                    });
                }
            }
        }

        let doc_slots = self.pending_docs as usize;
        for (name, value) in fields {
            let Some(kind) = ValueKind::of(value).or_else(|| self.field_kinds.get(*name).copied()) else {
                // NULL for a field that has never held a value
                continue;
            };
            self.field_kinds.entry(name.to_string()).or_insert(kind);
            let column = self
                .pending_columns
                .entry(name.to_string())
                .or_insert_with(|| ColumnValues::with_nulls(kind, doc_slots));
            if column.len() > doc_slots {
                // field repeated within the document; the first value wins
                continue;
            }
            column.push(name, value)?;
        }

        self.pending_docs += 1;
        let expected_len = self.pending_docs as usize;
        for (name, column) in self.pending_columns.iter_mut() {
            if column.len() < expected_len {
                column.push(name, &DataValue::Null)?;
            }
        }

        if expected_len >= self.config.max_docs_per_segment {
            self.flush()?;
        }
        Ok(())
    }

    /// Seal buffered documents into a segment
    pub fn flush(&mut self) -> Result<(), IndexError> {
        if self.pending_docs == 0 {
            return Ok(());
        }
        let columns = std::mem::take(&mut self.pending_columns);
        let segment = Segment::new(self.pending_docs, columns)?;
        debug!("Flushed segment {} with {} docs", self.segments.len(), self.pending_docs);
        self.segments.push(Arc::new(segment));
        self.pending_docs = 0;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), IndexError> {
        self.flush()
    }

    /// Mark every committed document whose `field` equals `value` as deleted
    pub fn delete_term(&mut self, field: &str, value: &DataValue) -> usize {
        let mut deleted = 0;
        for segment in self.segments.iter_mut() {
            let matches: Vec<DocId> = (0..segment.max_doc())
                .filter(|doc| segment.is_live(*doc) && segment.value(field, *doc) == *value)
                .collect();
            if matches.is_empty() {
                continue;
            }
            let segment = Arc::make_mut(segment);
            for doc in matches {
                if segment.delete(doc) {
                    deleted += 1;
                }
            }
        }
        deleted
    }

    /// Snapshot of the committed segments
    pub fn reader(&self) -> IndexReader {
        IndexReader::new(self.segments.clone())
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Persist committed segments as `<dir>/segment_NNNNNN.seg`
    pub fn write_segments(&self, dir: impl AsRef<Path>) -> Result<(), IndexError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (ord, segment) in self.segments.iter().enumerate() {
            let path = dir.join(format!("segment_{:06}.{}", ord, SEGMENT_FILE_EXTENSION));
            let mut writer = BufWriter::new(File::create(&path)?);
            segment.write_to(&mut writer)?;
        }
        info!("Wrote {} segments to {}", self.segments.len(), dir.display());
        Ok(())
    }
}
