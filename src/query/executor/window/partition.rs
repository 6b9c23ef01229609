use crate::query::executor::expression_eval::RowExpression;
use crate::query::executor::result::{DataValue, QueryResult, Row};

/// Extracts the partition key of a row.
///
/// Without expressions every row shares the empty key, so the input forms a
/// single partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionBy {
    exprs: Vec<RowExpression>,
}

impl PartitionBy {
    pub fn new(exprs: Vec<RowExpression>) -> Self {
        Self { exprs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn key(&self, row: &Row) -> QueryResult<Vec<DataValue>> {
        self.exprs.iter().map(|e| e.evaluate(row.values())).collect()
    }
}
