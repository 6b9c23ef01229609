#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use bayun_exec::common::config::ExecutionConfig;
use bayun_exec::query::executor::collect::{ColumnReference, ColumnarScanIterator};
use bayun_exec::query::executor::ram_accounting::RamAccountingContext;
use bayun_exec::query::executor::result::{DataValue, Row};
use bayun_exec::storage::index::{IndexSearcher, IndexWriter, IndexWriterConfig, Query};

// Build an index with one integer field `x`
pub fn int_writer(values: &[Option<i64>], max_docs_per_segment: usize) -> Result<IndexWriter> {
    let mut writer = IndexWriter::new(IndexWriterConfig { max_docs_per_segment });
    for v in values {
        writer.add_document(&[("x", DataValue::from(*v))])?;
    }
    writer.commit()?;
    Ok(writer)
}

pub fn int_searcher(values: &[Option<i64>], max_docs_per_segment: usize) -> Result<IndexSearcher> {
    Ok(IndexSearcher::new(int_writer(values, max_docs_per_segment)?.reader()))
}

// Index with fields `id` (integer) and `tag` (text)
pub fn tagged_searcher(docs: &[(i64, &str)], max_docs_per_segment: usize) -> Result<IndexSearcher> {
    let mut writer = IndexWriter::new(IndexWriterConfig { max_docs_per_segment });
    for (id, tag) in docs {
        writer.add_document(&[("id", DataValue::Integer(*id)), ("tag", DataValue::from(*tag))])?;
    }
    writer.commit()?;
    Ok(IndexSearcher::new(writer.reader()))
}

// Scan of `x` projecting it unchanged
pub fn scan_x(
    searcher: &IndexSearcher,
    ram: Arc<RamAccountingContext>,
    batch_size: usize,
) -> Result<ColumnarScanIterator> {
    let config = ExecutionConfig::default().with_batch_size(batch_size);
    Ok(ColumnarScanIterator::new(
        searcher,
        Query::MatchAll,
        None,
        false,
        vec![ColumnReference::integer("x")],
        ColumnarScanIterator::identity_outputs(1),
        ram,
        &config,
    )?)
}

pub fn int_rows(values: &[Option<i64>]) -> Vec<Row> {
    values.iter().map(|v| Row::new(vec![DataValue::from(*v)])).collect()
}

// Values of one column across rows
pub fn column(rows: &[Row], index: usize) -> Vec<DataValue> {
    rows.iter()
        .map(|r| r.get(index).cloned().unwrap_or(DataValue::Null))
        .collect()
}

// The trailing window value of every row as an integer
pub fn row_numbers(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.values().last().and_then(DataValue::as_i64))
        .collect()
}
