// Row Expression Evaluation
//
// Expressions over positional row values. Scan projections, partition keys and
// ORDER BY keys are all expressed this way; `Column(i)` reads position `i` of
// whatever value slice the expression is evaluated against.

use std::cmp::Ordering;

use crate::query::executor::result::{DataValue, QueryError, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowExpression {
    Column(usize),
    Literal(DataValue),
    BinaryOp {
        left: Box<RowExpression>,
        op: BinaryOperator,
        right: Box<RowExpression>,
    },
    IsNull {
        expr: Box<RowExpression>,
        not: bool,
    },
    Not(Box<RowExpression>),
    Negate(Box<RowExpression>),
    /// Searched CASE: the first WHEN evaluating to TRUE picks its THEN
    Case {
        when_then_clauses: Vec<(RowExpression, RowExpression)>,
        else_clause: Option<Box<RowExpression>>,
    },
}

impl RowExpression {
    pub fn column(index: usize) -> Self {
        RowExpression::Column(index)
    }

    pub fn literal(value: impl Into<DataValue>) -> Self {
        RowExpression::Literal(value.into())
    }

    pub fn binary(left: RowExpression, op: BinaryOperator, right: RowExpression) -> Self {
        RowExpression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Highest column position referenced, if any
    pub fn max_column(&self) -> Option<usize> {
        match self {
            RowExpression::Column(i) => Some(*i),
            RowExpression::Literal(_) => None,
            RowExpression::BinaryOp { left, right, .. } => left.max_column().max(right.max_column()),
            RowExpression::IsNull { expr, .. } | RowExpression::Not(expr) | RowExpression::Negate(expr) => expr.max_column(),
            RowExpression::Case { when_then_clauses, else_clause } => when_then_clauses
                .iter()
                .flat_map(|(w, t)| [w.max_column(), t.max_column()])
                .chain(std::iter::once(else_clause.as_ref().and_then(|e| e.max_column())))
                .max()
                .flatten(),
        }
    }

    pub fn evaluate(&self, values: &[DataValue]) -> QueryResult<DataValue> {
        evaluate_expression(self, values)
    }
}

/// Evaluate an expression against the values of a single row
pub fn evaluate_expression(expr: &RowExpression, values: &[DataValue]) -> QueryResult<DataValue> {
    match expr {
        RowExpression::Literal(val) => Ok(val.clone()),
        RowExpression::Column(index) => values
            .get(*index)
            .cloned()
            .ok_or_else(|| QueryError::ColumnNotFound(format!(
                "column position {} out of range for row of {} values", index, values.len()
            ))),
        RowExpression::BinaryOp { left, op, right } => {
            let left_val = evaluate_expression(left, values)?;
            let right_val = evaluate_expression(right, values)?;

            match op {
                BinaryOperator::And => return kleene_and(&left_val, &right_val),
                BinaryOperator::Or => return kleene_or(&left_val, &right_val),
                _ => {}
            }

            // NULL propagation: op(NULL, _) -> NULL, op(_, NULL) -> NULL
            if left_val.is_null() || right_val.is_null() {
                return Ok(DataValue::Null);
            }

            match op {
                BinaryOperator::Equals => Ok(DataValue::Boolean(compare(&left_val, &right_val, "=")? == Ordering::Equal)),
                BinaryOperator::NotEquals => Ok(DataValue::Boolean(compare(&left_val, &right_val, "<>")? != Ordering::Equal)),
                BinaryOperator::LessThan => Ok(DataValue::Boolean(compare(&left_val, &right_val, "<")? == Ordering::Less)),
                BinaryOperator::LessEquals => Ok(DataValue::Boolean(compare(&left_val, &right_val, "<=")? != Ordering::Greater)),
                BinaryOperator::GreaterThan => Ok(DataValue::Boolean(compare(&left_val, &right_val, ">")? == Ordering::Greater)),
                BinaryOperator::GreaterEquals => Ok(DataValue::Boolean(compare(&left_val, &right_val, ">=")? != Ordering::Less)),
                BinaryOperator::Plus => {
                    match (left_val, right_val) {
                        (DataValue::Integer(l), DataValue::Integer(r)) => Ok(DataValue::Integer(l.checked_add(r).ok_or(QueryError::NumericOverflow)?)),
                        (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l + r)),
                        (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 + r)),
                        (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l + r as f64)),
                        _ => Err(QueryError::TypeError("Unsupported types for + operator".to_string()))
                    }
                }
                BinaryOperator::Minus => {
                    match (left_val, right_val) {
                        (DataValue::Integer(l), DataValue::Integer(r)) => Ok(DataValue::Integer(l.checked_sub(r).ok_or(QueryError::NumericOverflow)?)),
                        (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l - r)),
                        (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 - r)),
                        (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l - r as f64)),
                        _ => Err(QueryError::TypeError("Unsupported types for - operator".to_string()))
                    }
                }
                BinaryOperator::Multiply => {
                    match (left_val, right_val) {
                        (DataValue::Integer(l), DataValue::Integer(r)) => Ok(DataValue::Integer(l.checked_mul(r).ok_or(QueryError::NumericOverflow)?)),
                        (DataValue::Float(l), DataValue::Float(r)) => Ok(DataValue::Float(l * r)),
                        (DataValue::Integer(l), DataValue::Float(r)) => Ok(DataValue::Float(l as f64 * r)),
                        (DataValue::Float(l), DataValue::Integer(r)) => Ok(DataValue::Float(l * r as f64)),
                        _ => Err(QueryError::TypeError("Unsupported types for * operator".to_string()))
                    }
                }
                BinaryOperator::Divide => {
                    match (left_val, right_val) {
                        (DataValue::Integer(l), DataValue::Integer(r)) => {
                            if r == 0 { Err(QueryError::DivisionByZero) }
                            else { Ok(DataValue::Integer(l.checked_div(r).ok_or(QueryError::NumericOverflow)?)) }
                        }
                        (DataValue::Float(l), DataValue::Float(r)) => {
                            if r == 0.0 { Err(QueryError::DivisionByZero) }
                            else { Ok(DataValue::Float(l / r)) }
                        }
                        (DataValue::Integer(l), DataValue::Float(r)) => {
                            if r == 0.0 { Err(QueryError::DivisionByZero) }
                            else { Ok(DataValue::Float(l as f64 / r)) }
                        }
                        (DataValue::Float(l), DataValue::Integer(r)) => {
                            if r == 0 { Err(QueryError::DivisionByZero) }
                            else { Ok(DataValue::Float(l / r as f64)) }
                        }
                        _ => Err(QueryError::TypeError("Unsupported types for / operator".to_string()))
                    }
                }
                BinaryOperator::Modulo => {
                    match (left_val, right_val) {
                        (DataValue::Integer(l), DataValue::Integer(r)) => {
                            if r == 0 { Err(QueryError::DivisionByZero) }
                            else { Ok(DataValue::Integer(l.checked_rem(r).ok_or(QueryError::NumericOverflow)?)) }
                        }
                        _ => Err(QueryError::TypeError("Modulo operator only supports integers".to_string()))
                    }
                }
                BinaryOperator::And | BinaryOperator::Or => unreachable!("handled before NULL propagation"),
            }
        }
        RowExpression::Negate(expr) => {
            match evaluate_expression(expr, values)? {
                DataValue::Integer(i) => Ok(DataValue::Integer(i.checked_neg().ok_or(QueryError::NumericOverflow)?)),
                DataValue::Float(f) => Ok(DataValue::Float(-f)),
                DataValue::Null => Ok(DataValue::Null),
                other => Err(QueryError::TypeError(format!("Unary minus not supported for type {}", other.type_name())))
            }
        }
        RowExpression::Not(expr) => {
            // NOT TRUE -> FALSE, NOT FALSE -> TRUE, NOT NULL -> NULL
            match evaluate_expression(expr, values)? {
                DataValue::Boolean(b) => Ok(DataValue::Boolean(!b)),
                DataValue::Null => Ok(DataValue::Null),
                other => Err(QueryError::TypeError(format!("NOT requires a boolean or NULL operand, got {}", other.type_name())))
            }
        }
        RowExpression::IsNull { expr, not } => {
            let result = evaluate_expression(expr, values)?.is_null();
            Ok(DataValue::Boolean(if *not { !result } else { result }))
        }
        RowExpression::Case { when_then_clauses, else_clause } => {
            for (when_expr, then_expr) in when_then_clauses {
                let condition_met = match evaluate_expression(when_expr, values)? {
                    DataValue::Boolean(b) => b,
                    // NULL in a condition counts as false
                    DataValue::Null => false,
                    _ => return Err(QueryError::TypeError("CASE WHEN condition did not evaluate to a boolean or NULL".to_string())),
                };
                if condition_met {
                    return evaluate_expression(then_expr, values);
                }
            }
            match else_clause {
                Some(else_expr) => evaluate_expression(else_expr, values),
                None => Ok(DataValue::Null),
            }
        }
    }
}

fn compare(left: &DataValue, right: &DataValue, op: &str) -> QueryResult<Ordering> {
    left.partial_cmp(right).ok_or_else(|| QueryError::TypeError(format!(
        "Cannot compare {} {} {}", left.type_name(), op, right.type_name()
    )))
}

fn as_logical(value: &DataValue, op: &str) -> QueryResult<Option<bool>> {
    match value {
        DataValue::Boolean(b) => Ok(Some(*b)),
        DataValue::Null => Ok(None),
        other => Err(QueryError::TypeError(format!("{} requires boolean operands, got {}", op, other.type_name()))),
    }
}

fn kleene_and(left: &DataValue, right: &DataValue) -> QueryResult<DataValue> {
    Ok(match (as_logical(left, "AND")?, as_logical(right, "AND")?) {
        (Some(false), _) | (_, Some(false)) => DataValue::Boolean(false),
        (Some(true), Some(true)) => DataValue::Boolean(true),
        _ => DataValue::Null,
    })
}

fn kleene_or(left: &DataValue, right: &DataValue) -> QueryResult<DataValue> {
    Ok(match (as_logical(left, "OR")?, as_logical(right, "OR")?) {
        (Some(true), _) | (_, Some(true)) => DataValue::Boolean(true),
        (Some(false), Some(false)) => DataValue::Boolean(false),
        _ => DataValue::Null,
    })
}
