// Query Result Types
//
// This module defines values, rows and errors flowing through the execution pipeline.

use std::cmp::{Eq, Ordering};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::common::config::NullOrdering;
use crate::common::types::{FIXED_VALUE_BYTES, ROW_OVERHEAD_BYTES};
use crate::storage::index::IndexError;

/// Possible data types for values in a row
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

/// -0.0 folds into 0.0 and every NaN into one NaN, so equal keys share a bit pattern
fn canonical_f64(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

/// Total float order: NaN sorts above every number
fn cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

// NULL is its own equality class for grouping; floats compare by canonical bits.
impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => true,
            (DataValue::Integer(a), DataValue::Integer(b)) => a == b,
            (DataValue::Float(a), DataValue::Float(b)) => {
                canonical_f64(*a).to_bits() == canonical_f64(*b).to_bits()
            }
            (DataValue::Text(a), DataValue::Text(b)) => a == b,
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0.hash(state),
            DataValue::Integer(i) => { 1.hash(state); i.hash(state); }
            DataValue::Float(f) => { 2.hash(state); canonical_f64(*f).to_bits().hash(state); }
            DataValue::Text(s) => { 3.hash(state); s.hash(state); }
            DataValue::Boolean(b) => { 4.hash(state); b.hash(state); }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "\"{}\"", s),
            DataValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => Some(Ordering::Equal),
            (DataValue::Null, _) => Some(Ordering::Less),
            (_, DataValue::Null) => Some(Ordering::Greater),

            (DataValue::Integer(a), DataValue::Integer(b)) => a.partial_cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => Some(cmp_f64(*a, *b)),
            (DataValue::Integer(a), DataValue::Float(b)) => Some(cmp_f64(*a as f64, *b)),
            (DataValue::Float(a), DataValue::Integer(b)) => Some(cmp_f64(*a, *b as f64)),
            (DataValue::Text(a), DataValue::Text(b)) => Some(a.cmp(b)),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.partial_cmp(b),

            _ => None,
        }
    }
}

impl DataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Integer(_) => "integer",
            DataValue::Float(_) => "float",
            DataValue::Text(_) => "text",
            DataValue::Boolean(_) => "boolean",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Compare two non-null-aware values.
    /// NULLs are considered less than any non-NULL value.
    /// Returns Ordering or QueryError for incompatible types.
    pub fn compare(&self, other: &Self) -> QueryResult<Ordering> {
        self.partial_cmp(other).ok_or_else(||
            QueryError::TypeError(format!("Cannot compare incompatible types: {} and {}", self.type_name(), other.type_name()))
        )
    }

    /// Total ordering used for sorting.
    ///
    /// NULL placement follows `nulls`; `descending` reverses non-null comparisons
    /// and, for the direction-relative policies, the NULL placement as well.
    /// Values of incomparable types are ordered by type so sorting never fails.
    pub fn sort_cmp(&self, other: &Self, descending: bool, nulls: NullOrdering) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) | (false, true) => {
                let null_first = match nulls {
                    NullOrdering::NullsFirst => true,
                    NullOrdering::NullsLast => false,
                    NullOrdering::NullsLargest => descending,
                    NullOrdering::NullsSmallest => !descending,
                };
                let self_first = self.is_null() == null_first;
                return if self_first { Ordering::Less } else { Ordering::Greater };
            }
            (false, false) => {}
        }

        let ord = self.partial_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()));
        if descending { ord.reverse() } else { ord }
    }

    fn type_rank(&self) -> u8 {
        match self {
            DataValue::Null => 0,
            DataValue::Boolean(_) => 1,
            DataValue::Integer(_) | DataValue::Float(_) => 2,
            DataValue::Text(_) => 3,
        }
    }

    /// Estimated heap + inline footprint used for memory accounting
    pub fn estimated_size(&self) -> usize {
        match self {
            DataValue::Text(s) => FIXED_VALUE_BYTES + s.len(),
            _ => FIXED_VALUE_BYTES,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

/// A fixed-arity, positional tuple of values for one record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<DataValue>,
}

impl Row {
    pub fn new(values: Vec<DataValue>) -> Self {
        Row { values }
    }

    /// Get a value by position
    pub fn get(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a new row with `extra` appended after the existing values
    pub fn appended(&self, extra: impl IntoIterator<Item = DataValue>) -> Row {
        let mut values = self.values.clone();
        values.extend(extra);
        Row { values }
    }

    /// Bytes charged against the accounting context when this row is materialized
    pub fn estimated_size(&self) -> usize {
        ROW_OVERHEAD_BYTES + self.values.iter().map(DataValue::estimated_size).sum::<usize>()
    }
}

impl From<Vec<DataValue>> for Row {
    fn from(values: Vec<DataValue>) -> Self {
        Row::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "| ")?;
        for value in &self.values {
            write!(f, "{} | ", value)?;
        }
        Ok(())
    }
}

/// Represents query execution error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Error from storage layer
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Accounting context would exceed its limit
    #[error("Memory limit exceeded in [{context}]: requested {requested} bytes, used {used} of {limit} bytes")]
    MemoryLimitExceeded {
        context: String,
        requested: usize,
        used: usize,
        limit: usize,
    },
    /// Iterator used in a way its contract forbids
    #[error("Illegal iterator state: {0}")]
    IllegalState(String),
    /// Iteration was killed while in flight
    #[error("Cancelled: {0}")]
    Cancelled(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Error in data type conversion
    #[error("Type error: {0}")]
    TypeError(String),
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Numeric overflow
    #[error("Numeric overflow")]
    NumericOverflow,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::TypeMismatch { .. } => QueryError::TypeError(err.to_string()),
            other => QueryError::StorageError(other.to_string()),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
