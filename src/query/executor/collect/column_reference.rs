use std::sync::Arc;

use crate::common::types::ScoredDoc;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};
use crate::storage::index::{Segment, ValueKind};

/// Name under which the relevance score is exposed
pub const SCORE_COLUMN: &str = "_score";

/// Name under which the per-segment doc id is exposed
pub const DOC_ID_COLUMN: &str = "_doc";

/// What a column reference reads
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// A stored field of the given kind
    Field { name: String, kind: ValueKind },
    /// The document's score; NULL when scores were not computed
    Score,
    /// The doc id within its segment
    DocId,
}

/// Reads one value per document from the segment it is bound to.
///
/// A reference is rebound with `set_next_segment` whenever the scan enters a new
/// segment, then positioned with `set_next_doc` for every document.
#[derive(Debug, Clone)]
pub struct ColumnReference {
    source: ColumnSource,
    segment: Option<Arc<Segment>>,
    doc: Option<ScoredDoc>,
}

impl ColumnReference {
    pub fn new(source: ColumnSource) -> Self {
        Self {
            source,
            segment: None,
            doc: None,
        }
    }

    pub fn field(name: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(ColumnSource::Field { name: name.into(), kind })
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::field(name, ValueKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::field(name, ValueKind::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::field(name, ValueKind::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::field(name, ValueKind::Boolean)
    }

    pub fn score() -> Self {
        Self::new(ColumnSource::Score)
    }

    pub fn doc_id() -> Self {
        Self::new(ColumnSource::DocId)
    }

    pub fn source(&self) -> &ColumnSource {
        &self.source
    }

    pub fn name(&self) -> &str {
        match &self.source {
            ColumnSource::Field { name, .. } => name,
            ColumnSource::Score => SCORE_COLUMN,
            ColumnSource::DocId => DOC_ID_COLUMN,
        }
    }

    /// Bind to a new segment. A segment without the field reads NULL for it;
    /// a segment storing it with another kind is a type error.
    pub fn set_next_segment(&mut self, segment: &Arc<Segment>) -> QueryResult<()> {
        if let ColumnSource::Field { name, kind } = &self.source {
            if let Some(column) = segment.column(name) {
                if column.kind() != *kind {
                    return Err(QueryError::TypeError(format!(
                        "Column '{}' is declared {:?} but stored as {:?}",
                        name, kind, column.kind()
                    )));
                }
            }
        }
        self.segment = Some(Arc::clone(segment));
        self.doc = None;
        Ok(())
    }

    pub fn set_next_doc(&mut self, doc: &ScoredDoc) {
        self.doc = Some(*doc);
    }

    /// Value at the current document
    pub fn value(&self) -> QueryResult<DataValue> {
        let doc = self.doc.as_ref().ok_or_else(|| {
            QueryError::IllegalState(format!("column reference '{}' is not positioned", self.name()))
        })?;
        match &self.source {
            ColumnSource::Field { name, .. } => {
                let segment = self.segment.as_ref().ok_or_else(|| {
                    QueryError::IllegalState(format!("column reference '{}' is not bound", name))
                })?;
                Ok(segment.value(name, doc.doc))
            }
            ColumnSource::Score => Ok(doc.score.map_or(DataValue::Null, |s| DataValue::Float(s as f64))),
            ColumnSource::DocId => Ok(DataValue::Integer(doc.doc as i64)),
        }
    }
}
