use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bayun_exec::common::config::{ExecutionConfig, NullOrdering};
use bayun_exec::query::executor::batch_iterator::execute_query;
use bayun_exec::query::executor::collect::{ColumnReference, ColumnarScanIterator};
use bayun_exec::query::executor::expression_eval::{BinaryOperator, RowExpression};
use bayun_exec::query::executor::ram_accounting::RamAccountingContext;
use bayun_exec::query::executor::result::DataValue;
use bayun_exec::query::executor::window::{window_function, OrderBy, WindowBatchIterator, WindowDefinition};
use bayun_exec::storage::index::{IndexReader, IndexSearcher, IndexWriter, IndexWriterConfig, Query};

#[derive(Parser)]
#[command(author, version, about = "Bayun execution core - scan an index and number rows over a window")]
struct Cli {
    /// Document positions fetched per batch
    #[arg(short, long, default_value_t = 1024)]
    batch_size: usize,

    /// Memory budget for the query in bytes
    #[arg(short, long, default_value_t = 64 * 1024 * 1024)]
    memory_limit: usize,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the given values as an index directory
    Build {
        /// Target directory for segment files
        dir: PathBuf,

        /// Values of field `x`; `null` for a missing value
        values: Vec<String>,
    },

    /// ROW_NUMBER() OVER (PARTITION BY x % modulo ORDER BY x) over an index
    Run {
        /// Index directory; when absent `--values` are indexed in memory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Values of field `x` for an in-memory index
        #[arg(short, long, value_delimiter = ',')]
        values: Vec<String>,

        /// Partition by `x % modulo`; no partitioning when absent
        #[arg(short, long)]
        partition_modulo: Option<i64>,

        /// Order descending instead of ascending
        #[arg(long)]
        descending: bool,

        /// Put NULL first instead of treating it as the largest value
        #[arg(long)]
        nulls_first: bool,
    },
}

fn parse_value(raw: &str) -> Result<DataValue> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(DataValue::Null);
    }
    let value: i64 = raw.trim().parse().with_context(|| format!("not an integer: {}", raw))?;
    Ok(DataValue::Integer(value))
}

fn build_writer(values: &[String], config: &ExecutionConfig) -> Result<IndexWriter> {
    let mut writer = IndexWriter::new(IndexWriterConfig::from(config));
    for raw in values {
        writer.add_document(&[("x", parse_value(raw)?)])?;
    }
    writer.commit()?;
    Ok(writer)
}

fn run(
    reader: IndexReader,
    partition_modulo: Option<i64>,
    descending: bool,
    nulls_first: bool,
    config: &ExecutionConfig,
) -> Result<()> {
    let searcher = IndexSearcher::new(reader);
    let ram = RamAccountingContext::new("demo-query", config.memory_limit_bytes);

    let scan = ColumnarScanIterator::new(
        &searcher,
        Query::MatchAll,
        None,
        false,
        vec![ColumnReference::integer("x")],
        ColumnarScanIterator::identity_outputs(1),
        ram.clone(),
        config,
    )?;

    let partition_by = partition_modulo
        .map(|m| vec![RowExpression::binary(RowExpression::column(0), BinaryOperator::Modulo, RowExpression::literal(m))])
        .unwrap_or_default();
    let mut order = if descending {
        OrderBy::desc(RowExpression::column(0))
    } else {
        OrderBy::asc(RowExpression::column(0))
    };
    if nulls_first {
        order = order.with_nulls(NullOrdering::NullsFirst);
    }

    let mut window = WindowBatchIterator::from_definition(
        Box::new(scan),
        WindowDefinition::new(partition_by, vec![order]),
        vec![window_function("row_number")?],
        ram.clone(),
        config,
    )?;

    let rows = execute_query(&mut window, &ram)?;
    println!("| x | row_number |");
    for row in &rows {
        println!("{}", row);
    }
    println!("{} rows", rows.len());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ExecutionConfig::default()
        .with_batch_size(cli.batch_size)
        .with_memory_limit(cli.memory_limit);

    match cli.command {
        Commands::Build { dir, values } => {
            let writer = build_writer(&values, &config)?;
            writer.write_segments(&dir)
                .with_context(|| format!("failed to write segments to {}", dir.display()))?;
            println!("Wrote {} documents in {} segments to {}", values.len(), writer.num_segments(), dir.display());
        }
        Commands::Run { dir, values, partition_modulo, descending, nulls_first } => {
            let reader = match dir {
                Some(dir) => IndexReader::open(&dir)
                    .with_context(|| format!("failed to open index at {}", dir.display()))?,
                None => build_writer(&values, &config)?.reader(),
            };
            run(reader, partition_modulo, descending, nulls_first, &config)?;
        }
    }

    Ok(())
}
