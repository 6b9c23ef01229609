use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};

/// A function evaluated over the rows of one partition, in partition order.
///
/// `reset` is called at the start of every partition, then `compute` once per
/// row. Implementations keep whatever running state they need between rows.
pub trait WindowFunction: Send {
    fn name(&self) -> &str;

    fn reset(&mut self);

    fn compute(&mut self, row: &Row) -> QueryResult<DataValue>;
}

/// ROW_NUMBER(): 1, 2, 3, ... within each partition. Ties get distinct numbers.
#[derive(Debug, Default)]
pub struct RowNumber {
    counter: i64,
}

impl RowNumber {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowFunction for RowNumber {
    fn name(&self) -> &str {
        "row_number"
    }

    fn reset(&mut self) {
        self.counter = 0;
    }

    fn compute(&mut self, _row: &Row) -> QueryResult<DataValue> {
        self.counter = self.counter.checked_add(1).ok_or(QueryError::NumericOverflow)?;
        Ok(DataValue::Integer(self.counter))
    }
}

/// Look up a window function by its SQL name (case-insensitive)
pub fn window_function(name: &str) -> QueryResult<Box<dyn WindowFunction>> {
    match name.to_ascii_lowercase().as_str() {
        "row_number" => Ok(Box::new(RowNumber::new())),
        other => Err(QueryError::ExecutionError(format!("Unsupported window function: {}", other))),
    }
}
