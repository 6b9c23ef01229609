use std::cmp::Ordering;

use crate::common::config::NullOrdering;
use crate::query::executor::expression_eval::RowExpression;
use crate::query::executor::result::{DataValue, QueryResult, Row};

/// One ORDER BY key of a window
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: RowExpression,
    pub descending: bool,
    /// Falls back to the comparator's default when unset
    pub nulls: Option<NullOrdering>,
}

impl OrderBy {
    pub fn asc(expr: RowExpression) -> Self {
        Self { expr, descending: false, nulls: None }
    }

    pub fn desc(expr: RowExpression) -> Self {
        Self { expr, descending: true, nulls: None }
    }

    pub fn with_nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = Some(nulls);
        self
    }
}

/// Orders rows by precomputed ORDER BY keys
#[derive(Debug, Clone)]
pub struct RowComparator {
    keys: Vec<OrderBy>,
    default_nulls: NullOrdering,
}

impl RowComparator {
    pub fn new(keys: Vec<OrderBy>, default_nulls: NullOrdering) -> Self {
        Self { keys, default_nulls }
    }

    /// `None` when there is nothing to order by
    pub fn from_order_by(keys: Vec<OrderBy>, default_nulls: NullOrdering) -> Option<Self> {
        (!keys.is_empty()).then(|| Self::new(keys, default_nulls))
    }

    pub fn sort_key(&self, row: &Row) -> QueryResult<Vec<DataValue>> {
        self.keys.iter().map(|k| k.expr.evaluate(row.values())).collect()
    }

    pub fn compare_keys(&self, a: &[DataValue], b: &[DataValue]) -> Ordering {
        for (key, (va, vb)) in self.keys.iter().zip(a.iter().zip(b.iter())) {
            let nulls = key.nulls.unwrap_or(self.default_nulls);
            match va.sort_cmp(vb, key.descending, nulls) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// Stable sort by ORDER BY keys; rows with equal keys keep their relative order
    pub fn sort(&self, rows: Vec<Row>) -> QueryResult<Vec<Row>> {
        let mut keyed = rows
            .into_iter()
            .map(|row| Ok((self.sort_key(&row)?, row)))
            .collect::<QueryResult<Vec<(Vec<DataValue>, Row)>>>()?;
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}
