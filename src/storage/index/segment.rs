use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::common::types::{DocId, SEGMENT_FORMAT_VERSION, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC};
use crate::query::executor::result::DataValue;
use crate::storage::index::IndexError;

/// Physical type of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ValueKind {
    /// Kind of a non-null value; `None` for NULL
    pub fn of(value: &DataValue) -> Option<ValueKind> {
        match value {
            DataValue::Null => None,
            DataValue::Integer(_) => Some(ValueKind::Integer),
            DataValue::Float(_) => Some(ValueKind::Float),
            DataValue::Text(_) => Some(ValueKind::Text),
            DataValue::Boolean(_) => Some(ValueKind::Boolean),
        }
    }
}

/// Per-document values of one column, one slot per doc id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
}

impl ColumnValues {
    /// An all-NULL column of `kind` with `len` slots
    pub fn with_nulls(kind: ValueKind, len: usize) -> Self {
        match kind {
            ValueKind::Integer => ColumnValues::Integer(vec![None; len]),
            ValueKind::Float => ColumnValues::Float(vec![None; len]),
            ValueKind::Text => ColumnValues::Text(vec![None; len]),
            ValueKind::Boolean => ColumnValues::Boolean(vec![None; len]),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ColumnValues::Integer(_) => ValueKind::Integer,
            ColumnValues::Float(_) => ValueKind::Float,
            ColumnValues::Text(_) => ValueKind::Text,
            ColumnValues::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of `doc`; documents without a value read as NULL
    pub fn value_at(&self, doc: DocId) -> DataValue {
        let i = doc as usize;
        match self {
            ColumnValues::Integer(v) => v.get(i).copied().flatten().map_or(DataValue::Null, DataValue::Integer),
            ColumnValues::Float(v) => v.get(i).copied().flatten().map_or(DataValue::Null, DataValue::Float),
            ColumnValues::Text(v) => v.get(i).cloned().flatten().map_or(DataValue::Null, DataValue::Text),
            ColumnValues::Boolean(v) => v.get(i).copied().flatten().map_or(DataValue::Null, DataValue::Boolean),
        }
    }

    /// Append one slot. NULL is accepted by every kind.
    pub fn push(&mut self, field: &str, value: &DataValue) -> Result<(), IndexError> {
        match (self, value) {
            (ColumnValues::Integer(v), DataValue::Integer(i)) => v.push(Some(*i)),
            (ColumnValues::Float(v), DataValue::Float(f)) => v.push(Some(*f)),
            (ColumnValues::Text(v), DataValue::Text(s)) => v.push(Some(s.clone())),
            (ColumnValues::Boolean(v), DataValue::Boolean(b)) => v.push(Some(*b)),
            (column, DataValue::Null) => column.push_null(),
            (column, other) => {
                return Err(IndexError::TypeMismatch {
                    field: field.to_string(),
                    expected: column.kind(),
                    found: other.type_name(),
                });
            }
        }
        Ok(())
    }

    fn push_null(&mut self) {
        match self {
            ColumnValues::Integer(v) => v.push(None),
            ColumnValues::Float(v) => v.push(None),
            ColumnValues::Text(v) => v.push(None),
            ColumnValues::Boolean(v) => v.push(None),
        }
    }
}

/// An immutable run of documents with columnar storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    max_doc: DocId,
    live: Vec<bool>,
    columns: BTreeMap<String, ColumnValues>,
}

impl Segment {
    /// Build a segment; every column must have exactly `max_doc` slots
    pub fn new(max_doc: DocId, columns: BTreeMap<String, ColumnValues>) -> Result<Self, IndexError> {
        if let Some((name, column)) = columns.iter().find(|(_, c)| c.len() != max_doc as usize) {
            return Err(IndexError::CorruptSegment(format!(
                "column '{}' has {} values but segment has {} docs", name, column.len(), max_doc
            )));
        }
        Ok(Self {
            max_doc,
            live: vec![true; max_doc as usize],
            columns,
        })
    }

    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }

    pub fn num_live_docs(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    pub fn is_live(&self, doc: DocId) -> bool {
        self.live.get(doc as usize).copied().unwrap_or(false)
    }

    /// Mark a document deleted. Returns true if it was live.
    pub fn delete(&mut self, doc: DocId) -> bool {
        match self.live.get_mut(doc as usize) {
            Some(live) if *live => {
                *live = false;
                true
            }
            _ => false,
        }
    }

    pub fn column(&self, field: &str) -> Option<&ColumnValues> {
        self.columns.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Value of `field` for `doc`; absent columns read as NULL
    pub fn value(&self, field: &str, doc: DocId) -> DataValue {
        self.columns
            .get(field)
            .map_or(DataValue::Null, |c| c.value_at(doc))
    }

    /// Serialize as header + bincode payload
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        let payload = bincode::serialize(self)?;
        let header = SegmentHeader {
            magic: SEGMENT_MAGIC,
            version: SEGMENT_FORMAT_VERSION,
            payload_len: payload.len() as u64,
        };
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = SegmentHeader::from_bytes(&header_bytes);

        if header.magic != SEGMENT_MAGIC {
            return Err(IndexError::CorruptSegment(format!("bad magic {:#x}", header.magic)));
        }
        if header.version != SEGMENT_FORMAT_VERSION {
            return Err(IndexError::CorruptSegment(format!("unsupported format version {}", header.version)));
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        reader.read_exact(&mut payload)?;
        let segment: Segment = bincode::deserialize(&payload)?;

        if segment.live.len() != segment.max_doc as usize {
            return Err(IndexError::CorruptSegment("live docs do not match max_doc".to_string()));
        }
        Ok(segment)
    }
}

#[derive(Debug, Clone, Copy)]
struct SegmentHeader {
    magic: u32,
    version: u16,
    payload_len: u64,
}

impl SegmentHeader {
    fn to_bytes(self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.magic);
        LittleEndian::write_u16(&mut bytes[4..6], self.version);
        LittleEndian::write_u64(&mut bytes[6..14], self.payload_len);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&bytes[0..4]),
            version: LittleEndian::read_u16(&bytes[4..6]),
            payload_len: LittleEndian::read_u64(&bytes[6..14]),
        }
    }
}
