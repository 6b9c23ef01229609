use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use bayun_exec::common::config::ExecutionConfig;
use bayun_exec::query::executor::batch_iterator::{collect_rows, execute_query, BatchIterator, MoveNext};
use bayun_exec::query::executor::expression_eval::{BinaryOperator, RowExpression};
use bayun_exec::query::executor::ram_accounting::RamAccountingContext;
use bayun_exec::query::executor::result::{DataValue, QueryError};
use bayun_exec::query::executor::sources::ChannelBatchIterator;
use bayun_exec::query::executor::window::{window_function, OrderBy, WindowBatchIterator, WindowDefinition};
use bayun_exec::storage::index::IndexSearcher;

#[path = "../common/mod.rs"]
mod common;
use common::{column, int_rows, int_searcher, row_numbers, scan_x};

fn parity_window() -> WindowDefinition {
    WindowDefinition::new(
        vec![RowExpression::binary(RowExpression::column(0), BinaryOperator::Modulo, RowExpression::literal(2i64))],
        vec![OrderBy::desc(RowExpression::column(0))],
    )
}

#[test]
fn test_scan_into_row_number() -> Result<()> {
    let searcher = int_searcher(&[Some(1), Some(2), Some(3), Some(4), Some(5)], 2)?;
    let ram = RamAccountingContext::new("query", 1024 * 1024);
    let scan = scan_x(&searcher, Arc::clone(&ram), 2)?;

    let mut window = WindowBatchIterator::from_definition(
        Box::new(scan),
        parity_window(),
        vec![window_function("row_number")?],
        Arc::clone(&ram),
        &ExecutionConfig::default(),
    )?;
    let rows = collect_rows(&mut window)?;

    // odd partition first (1 appeared first), each ordered descending
    assert_eq!(column(&rows, 0), vec![
        DataValue::Integer(5), DataValue::Integer(3), DataValue::Integer(1),
        DataValue::Integer(4), DataValue::Integer(2),
    ]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 3, 1, 2]);

    // every stage released what it charged and the scan handed its handle back
    assert_eq!(ram.used(), 0);
    assert_eq!(searcher.open_handles(), 0);
    Ok(())
}

fn numbered_scan(searcher: &IndexSearcher, ram: &Arc<RamAccountingContext>) -> Result<WindowBatchIterator> {
    let scan = scan_x(searcher, Arc::clone(ram), 8)?;
    Ok(WindowBatchIterator::from_definition(
        Box::new(scan),
        WindowDefinition::default(),
        vec![window_function("row_number")?],
        Arc::clone(ram),
        &ExecutionConfig::default(),
    )?)
}

#[test]
fn test_budget_shared_across_stages() -> Result<()> {
    let searcher = int_searcher(&(0..50i64).map(Some).collect::<Vec<_>>(), 16)?;

    // 50 buffered output rows of (x, row_number) plus the scan's current row
    let ram = RamAccountingContext::new("query", 3 * 1024);
    let rows = collect_rows(&mut numbered_scan(&searcher, &ram)?)?;
    assert_eq!(rows.len(), 50);
    assert_eq!(ram.used(), 0);

    let ram = RamAccountingContext::new("query", 2 * 1024);
    let err = collect_rows(&mut numbered_scan(&searcher, &ram)?).unwrap_err();
    assert!(matches!(err, QueryError::MemoryLimitExceeded { .. }));
    assert_eq!(ram.used(), 0);
    assert_eq!(searcher.open_handles(), 0);
    Ok(())
}

#[test]
fn test_query_tears_down_accounting_context() -> Result<()> {
    let searcher = int_searcher(&[Some(2), Some(1)], 10)?;
    let ram = RamAccountingContext::new("query", 1024 * 1024);
    let rows = execute_query(&mut numbered_scan(&searcher, &ram)?, &ram)?;
    assert_eq!(row_numbers(&rows), vec![1, 2]);

    assert!(ram.is_closed());
    assert!(matches!(ram.charge(1), Err(QueryError::IllegalState(_))));
    assert_eq!(searcher.open_handles(), 0);
    Ok(())
}

#[test]
fn test_failed_query_tears_down_accounting_context() -> Result<()> {
    let searcher = int_searcher(&[Some(1), Some(2), Some(3)], 10)?;
    let ram = RamAccountingContext::new("query", 64);
    let err = execute_query(&mut numbered_scan(&searcher, &ram)?, &ram).unwrap_err();
    assert!(matches!(err, QueryError::MemoryLimitExceeded { .. }));

    assert!(ram.is_closed());
    assert_eq!(ram.used(), 0);
    assert!(ram.charge(1).is_err());
    Ok(())
}

#[test]
fn test_window_over_pending_channel_source() -> Result<()> {
    let (tx, source) = ChannelBatchIterator::channel(1, "pipeline-source");
    let producer = thread::spawn(move || {
        for chunk in [[Some(3), Some(1)], [Some(2), None]] {
            thread::sleep(Duration::from_millis(5));
            if tx.send(Ok(int_rows(&chunk))).is_err() {
                return;
            }
        }
    });

    let mut window = WindowBatchIterator::from_definition(
        Box::new(source),
        WindowDefinition::new(vec![], vec![OrderBy::asc(RowExpression::column(0))]),
        vec![window_function("row_number")?],
        RamAccountingContext::unbounded("query"),
        &ExecutionConfig::default(),
    )?;
    let rows = collect_rows(&mut window)?;
    producer.join().map_err(|_| anyhow::anyhow!("producer panicked"))?;

    assert_eq!(column(&rows, 0), vec![
        DataValue::Integer(1), DataValue::Integer(2), DataValue::Integer(3), DataValue::Null,
    ]);
    assert_eq!(row_numbers(&rows), vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_kill_while_upstream_load_in_flight() -> Result<()> {
    // producer never sends, so the upstream load stays pending
    let (_tx, source) = ChannelBatchIterator::channel(1, "pipeline-source");
    let mut window = WindowBatchIterator::from_definition(
        Box::new(source),
        WindowDefinition::default(),
        vec![window_function("row_number")?],
        RamAccountingContext::unbounded("query"),
        &ExecutionConfig::default(),
    )?;

    assert_eq!(window.move_next()?, MoveNext::NeedsLoad);
    let load = window.load_next_batch();
    let reason = QueryError::Cancelled("query killed".to_string());
    window.close(Some(reason.clone()))?;

    assert_eq!(load.wait(), Err(reason.clone()));
    assert_eq!(window.move_next(), Err(reason));
    Ok(())
}
