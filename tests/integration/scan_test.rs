use std::sync::Arc;

use anyhow::Result;
use bayun_exec::common::config::ExecutionConfig;
use bayun_exec::query::executor::batch_iterator::{collect_rows, BatchIterator, LoadOutcome, MoveNext};
use bayun_exec::query::executor::collect::{ColumnReference, ColumnarScanIterator};
use bayun_exec::query::executor::expression_eval::RowExpression;
use bayun_exec::query::executor::ram_accounting::RamAccountingContext;
use bayun_exec::query::executor::result::{DataValue, QueryError, Row};
use bayun_exec::storage::index::{IndexReader, IndexSearcher, Query};

#[path = "../common/mod.rs"]
mod common;
use common::{column, int_searcher, int_writer, scan_x, tagged_searcher};

#[test]
fn test_scan_returns_all_docs_in_order() -> Result<()> {
    let searcher = int_searcher(&[Some(4), Some(3), None, Some(1), Some(9)], 2)?;
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 2)?;

    let rows = collect_rows(&mut scan)?;
    assert_eq!(column(&rows, 0), vec![
        DataValue::Integer(4), DataValue::Integer(3), DataValue::Null, DataValue::Integer(1), DataValue::Integer(9),
    ]);
    assert_eq!(searcher.open_handles(), 0);
    Ok(())
}

#[test]
fn test_exhaustion_is_sticky() -> Result<()> {
    let searcher = int_searcher(&[Some(1)], 10)?;
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 10)?;

    assert_eq!(scan.move_next()?, MoveNext::NeedsLoad);
    assert_eq!(scan.load_next_batch().wait()?, LoadOutcome::Exhausted);
    assert!(scan.all_loaded());
    assert_eq!(scan.move_next()?, MoveNext::Advanced);
    assert_eq!(scan.move_next()?, MoveNext::Exhausted);
    assert_eq!(scan.move_next()?, MoveNext::Exhausted);
    assert!(scan.current_element().is_err());
    assert_eq!(scan.load_next_batch().wait()?, LoadOutcome::Exhausted);
    scan.close(None)?;
    Ok(())
}

#[test]
fn test_empty_index() -> Result<()> {
    let searcher = IndexSearcher::new(IndexReader::new(vec![]));
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 4)?;
    assert!(collect_rows(&mut scan)?.is_empty());
    Ok(())
}

#[test]
fn test_query_and_min_score() -> Result<()> {
    let searcher = tagged_searcher(&[(1, "a"), (2, "b"), (3, "a"), (4, "c")], 3)?;
    let query = Query::Bool {
        must: vec![Query::range("id", Some(DataValue::Integer(2)), None)],
        should: vec![Query::term("tag", "a").boost(2.0)],
        must_not: vec![Query::term("tag", "c")],
    };
    let mut scan = ColumnarScanIterator::new(
        &searcher,
        query,
        Some(2.0),
        true,
        vec![ColumnReference::integer("id"), ColumnReference::score()],
        ColumnarScanIterator::identity_outputs(2),
        RamAccountingContext::unbounded("scan"),
        &ExecutionConfig::default(),
    )?;

    let rows = collect_rows(&mut scan)?;
    assert_eq!(rows, vec![Row::new(vec![DataValue::Integer(3), DataValue::Float(3.0)])]);
    Ok(())
}

#[test]
fn test_score_is_null_without_scoring() -> Result<()> {
    let searcher = tagged_searcher(&[(1, "a"), (2, "b")], 10)?;
    let mut scan = ColumnarScanIterator::new(
        &searcher,
        Query::term("tag", "b"),
        None,
        false,
        vec![ColumnReference::score(), ColumnReference::doc_id(), ColumnReference::text("tag")],
        vec![RowExpression::column(2), RowExpression::column(0), RowExpression::column(1)],
        RamAccountingContext::unbounded("scan"),
        &ExecutionConfig::default(),
    )?;

    let rows = collect_rows(&mut scan)?;
    assert_eq!(rows, vec![Row::new(vec![
        DataValue::Text("b".to_string()), DataValue::Null, DataValue::Integer(1),
    ])]);
    Ok(())
}

fn scan_tags(searcher: &IndexSearcher, ram: Arc<RamAccountingContext>) -> Result<ColumnarScanIterator> {
    Ok(ColumnarScanIterator::new(
        searcher,
        Query::MatchAll,
        None,
        false,
        vec![ColumnReference::text("tag")],
        ColumnarScanIterator::identity_outputs(1),
        ram,
        &ExecutionConfig::default(),
    )?)
}

#[test]
fn test_budget_exceeded_mid_scan() -> Result<()> {
    let searcher = tagged_searcher(&[(1, "a"), (2, "b"), (3, "a much longer tag"), (4, "c")], 10)?;
    let small = Row::new(vec![DataValue::from("a")]).estimated_size();
    let large = Row::new(vec![DataValue::from("a much longer tag")]).estimated_size();
    let ram = RamAccountingContext::new("small", small + 4);
    let mut scan = scan_tags(&searcher, Arc::clone(&ram))?;

    let err = collect_rows(&mut scan).unwrap_err();
    assert!(matches!(err, QueryError::MemoryLimitExceeded { requested, .. } if requested == large));
    assert_eq!(ram.used(), 0);
    assert_eq!(searcher.open_handles(), 0);
    // closed with the failure as reason
    assert_eq!(scan.move_next().unwrap_err(), err);
    Ok(())
}

#[test]
fn test_scan_holds_only_current_row() -> Result<()> {
    let searcher = tagged_searcher(&[(1, "a"), (2, "b"), (3, "c")], 2)?;
    let row_size = Row::new(vec![DataValue::from("a")]).estimated_size();
    let ram = RamAccountingContext::new("one-row", row_size);
    let mut scan = scan_tags(&searcher, Arc::clone(&ram))?;

    assert_eq!(scan.move_next()?, MoveNext::NeedsLoad);
    scan.load_next_batch().wait()?;
    for _ in 0..2 {
        assert_eq!(scan.move_next()?, MoveNext::Advanced);
        assert_eq!(ram.used(), row_size);
    }
    assert_eq!(collect_rows(&mut scan)?.len(), 1);
    assert_eq!(ram.used(), 0);
    Ok(())
}

#[test]
fn test_scan_persisted_segments() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let writer = int_writer(&[Some(5), Some(6), Some(7)], 2)?;
    writer.write_segments(dir.path())?;

    let searcher = IndexSearcher::new(IndexReader::open(dir.path())?);
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 1)?;
    let rows = collect_rows(&mut scan)?;
    assert_eq!(column(&rows, 0), vec![DataValue::Integer(5), DataValue::Integer(6), DataValue::Integer(7)]);
    Ok(())
}

#[test]
fn test_reader_closed_underneath_is_storage_error() -> Result<()> {
    let searcher = int_searcher(&[Some(1), Some(2)], 10)?;
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 10)?;
    searcher.reader().close();

    let err = collect_rows(&mut scan).unwrap_err();
    assert!(matches!(err, QueryError::StorageError(_)));
    assert_eq!(searcher.open_handles(), 0);
    Ok(())
}

#[test]
fn test_close_before_iteration_and_twice() -> Result<()> {
    let searcher = int_searcher(&[Some(1)], 10)?;
    let ram = RamAccountingContext::unbounded("scan");
    let mut scan = scan_x(&searcher, Arc::clone(&ram), 10)?;
    assert_eq!(searcher.open_handles(), 1);

    scan.close(Some(QueryError::Cancelled("killed".to_string())))?;
    scan.close(None)?;
    assert_eq!(searcher.open_handles(), 0);
    assert_eq!(scan.move_next(), Err(QueryError::Cancelled("killed".to_string())));
    assert!(scan.load_next_batch().wait().is_err());
    Ok(())
}

#[test]
fn test_deleted_docs_are_skipped() -> Result<()> {
    let mut writer = int_writer(&[Some(1), Some(2), Some(1)], 10)?;
    assert_eq!(writer.delete_term("x", &DataValue::Integer(1)), 2);
    let searcher = IndexSearcher::new(writer.reader());
    let mut scan = scan_x(&searcher, RamAccountingContext::unbounded("scan"), 10)?;
    assert_eq!(column(&collect_rows(&mut scan)?, 0), vec![DataValue::Integer(2)]);
    Ok(())
}
