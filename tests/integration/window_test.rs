use anyhow::Result;
use bayun_exec::common::config::{ExecutionConfig, NullOrdering};
use bayun_exec::query::executor::batch_iterator::{collect_rows, BatchIterator, MoveNext};
use bayun_exec::query::executor::expression_eval::{BinaryOperator, RowExpression};
use bayun_exec::query::executor::ram_accounting::RamAccountingContext;
use bayun_exec::query::executor::result::{DataValue, QueryError, Row};
use bayun_exec::query::executor::sources::InMemoryBatchIterator;
use bayun_exec::query::executor::window::{
    window_function, OrderBy, PartitionBy, RowComparator, RowNumber, WindowBatchIterator, WindowDefinition,
    WindowFunction,
};

#[path = "../common/mod.rs"]
mod common;
use common::{column, int_rows, row_numbers};

fn row_number_over(rows: Vec<Row>, definition: WindowDefinition) -> Result<Vec<Row>> {
    let mut window = WindowBatchIterator::from_definition(
        Box::new(InMemoryBatchIterator::new(rows)),
        definition,
        vec![window_function("row_number")?],
        RamAccountingContext::unbounded("window"),
        &ExecutionConfig::default(),
    )?;
    Ok(collect_rows(&mut window)?)
}

// x > 2
fn greater_than_two() -> RowExpression {
    RowExpression::binary(RowExpression::column(0), BinaryOperator::GreaterThan, RowExpression::literal(2i64))
}

#[test]
fn test_row_number_order_by() -> Result<()> {
    let rows = row_number_over(
        int_rows(&[Some(4), Some(3), Some(2), Some(1)]),
        WindowDefinition::new(vec![], vec![OrderBy::asc(RowExpression::column(0))]),
    )?;
    assert_eq!(row_numbers(&rows), vec![1, 2, 3, 4]);
    assert_eq!(column(&rows, 0), vec![
        DataValue::Integer(1), DataValue::Integer(2), DataValue::Integer(3), DataValue::Integer(4),
    ]);
    Ok(())
}

#[test]
fn test_row_number_partition_by() -> Result<()> {
    let input = [Some(1), Some(2), Some(2), Some(3), Some(4), Some(5), None];
    let rows = row_number_over(int_rows(&input), WindowDefinition::new(vec![greater_than_two()], vec![]))?;
    assert_eq!(row_numbers(&rows), vec![1, 2, 3, 1, 2, 3, 1]);
    // the NULL key forms its own partition, emitted last as it appeared last
    assert_eq!(rows[6].values(), &[DataValue::Null, DataValue::Integer(1)]);
    Ok(())
}

#[test]
fn test_row_number_partition_by_order_by() -> Result<()> {
    let input = [Some(1), Some(2), Some(2), Some(3), Some(4), Some(5), None];
    let rows = row_number_over(
        int_rows(&input),
        WindowDefinition::new(vec![greater_than_two()], vec![OrderBy::asc(RowExpression::column(0))]),
    )?;
    assert_eq!(row_numbers(&rows), vec![1, 2, 3, 1, 2, 3, 1]);
    Ok(())
}

#[test]
fn test_partitions_grouped_by_first_appearance() -> Result<()> {
    let input: Vec<Row> = ["A", "B", "A", "C", "B"]
        .iter()
        .map(|k| Row::new(vec![DataValue::from(*k)]))
        .collect();
    let rows = row_number_over(input, WindowDefinition::new(vec![RowExpression::column(0)], vec![]))?;

    let keys: Vec<String> = column(&rows, 0).iter().map(|v| v.to_string()).collect();
    assert_eq!(keys, vec!["\"A\"", "\"A\"", "\"B\"", "\"B\"", "\"C\""]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 1, 2, 1]);
    Ok(())
}

#[test]
fn test_no_partition_no_order_keeps_input_order() -> Result<()> {
    let rows = row_number_over(int_rows(&[Some(9), None, Some(7)]), WindowDefinition::default())?;
    assert_eq!(column(&rows, 0), vec![DataValue::Integer(9), DataValue::Null, DataValue::Integer(7)]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_ties_get_distinct_numbers() -> Result<()> {
    let input: Vec<Row> = [(1, "first"), (1, "second"), (0, "zero")]
        .iter()
        .map(|(k, tag)| Row::new(vec![DataValue::Integer(*k), DataValue::from(*tag)]))
        .collect();
    let rows = row_number_over(input, WindowDefinition::new(vec![], vec![OrderBy::asc(RowExpression::column(0))]))?;
    let tags: Vec<String> = column(&rows, 1).iter().map(|v| v.to_string()).collect();
    assert_eq!(tags, vec!["\"zero\"", "\"first\"", "\"second\""]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_null_ordering_follows_config() -> Result<()> {
    let definition = WindowDefinition::new(vec![], vec![OrderBy::asc(RowExpression::column(0))]);
    let input = [Some(2), None, Some(1)];

    let largest = row_number_over(int_rows(&input), definition.clone())?;
    assert_eq!(column(&largest, 0), vec![DataValue::Integer(1), DataValue::Integer(2), DataValue::Null]);

    let mut window = WindowBatchIterator::from_definition(
        Box::new(InMemoryBatchIterator::new(int_rows(&input))),
        definition,
        vec![window_function("row_number")?],
        RamAccountingContext::unbounded("window"),
        &ExecutionConfig::default().with_null_ordering(NullOrdering::NullsFirst),
    )?;
    let first = collect_rows(&mut window)?;
    assert_eq!(column(&first, 0), vec![DataValue::Null, DataValue::Integer(1), DataValue::Integer(2)]);
    Ok(())
}

#[test]
fn test_descending_order() -> Result<()> {
    let rows = row_number_over(
        int_rows(&[Some(1), Some(3), Some(2)]),
        WindowDefinition::new(vec![], vec![OrderBy::desc(RowExpression::column(0))]),
    )?;
    assert_eq!(column(&rows, 0), vec![DataValue::Integer(3), DataValue::Integer(2), DataValue::Integer(1)]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_multiple_functions_append_in_order() -> Result<()> {
    let functions: Vec<Box<dyn WindowFunction>> = vec![Box::new(RowNumber::new()), Box::new(RowNumber::new())];
    let mut window = WindowBatchIterator::new(
        Box::new(InMemoryBatchIterator::new(int_rows(&[Some(5)]))),
        PartitionBy::none(),
        None,
        functions,
        RamAccountingContext::unbounded("window"),
        "window-test",
    )?;
    let rows = collect_rows(&mut window)?;
    assert_eq!(rows[0].values(), &[DataValue::Integer(5), DataValue::Integer(1), DataValue::Integer(1)]);
    Ok(())
}

#[test]
fn test_empty_input() -> Result<()> {
    let rows = row_number_over(vec![], WindowDefinition::default())?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn test_partition_expression_error_fails_evaluation() -> Result<()> {
    // text > 2 cannot be compared
    let input = vec![Row::new(vec![DataValue::from("x")])];
    let comparator = RowComparator::from_order_by(vec![], NullOrdering::default());
    let mut window = WindowBatchIterator::new(
        Box::new(InMemoryBatchIterator::new(input)),
        PartitionBy::new(vec![greater_than_two()]),
        comparator,
        vec![window_function("row_number")?],
        RamAccountingContext::unbounded("window"),
        "window-test",
    )?;
    assert_eq!(window.move_next()?, MoveNext::NeedsLoad);
    let err = window.load_next_batch().wait().unwrap_err();
    assert!(matches!(err, QueryError::TypeError(_)));
    window.close(None)?;
    assert_eq!(window.move_next(), Err(err));
    Ok(())
}

fn float_rows(values: &[f64]) -> Vec<Row> {
    values.iter().map(|v| Row::new(vec![DataValue::Float(*v)])).collect()
}

#[test]
fn test_signed_zero_and_nan_share_partitions() -> Result<()> {
    let by_value = || WindowDefinition::new(vec![RowExpression::column(0)], vec![]);

    let zeros = row_number_over(float_rows(&[0.0, -0.0]), by_value())?;
    assert_eq!(row_numbers(&zeros), vec![1, 2]);

    let nans = row_number_over(float_rows(&[f64::NAN, 1.5, -f64::NAN]), by_value())?;
    assert_eq!(row_numbers(&nans), vec![1, 2, 1]);
    Ok(())
}

#[test]
fn test_order_by_floats_with_nan() -> Result<()> {
    let input: Vec<f64> = (0..200)
        .map(|i| if i % 7 == 0 { f64::NAN } else { ((i * 37) % 101) as f64 - 50.0 })
        .collect();
    let nan_count = input.iter().filter(|v| v.is_nan()).count();

    let rows = row_number_over(
        float_rows(&input),
        WindowDefinition::new(vec![], vec![OrderBy::asc(RowExpression::column(0))]),
    )?;
    assert_eq!(row_numbers(&rows), (1..=200).collect::<Vec<i64>>());

    let sorted: Vec<f64> = column(&rows, 0)
        .iter()
        .map(|v| match v {
            DataValue::Float(f) => *f,
            other => panic!("unexpected value {other}"),
        })
        .collect();
    let (numbers, nans) = sorted.split_at(sorted.len() - nan_count);
    assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
    assert!(nans.iter().all(|v| v.is_nan()));
    Ok(())
}
