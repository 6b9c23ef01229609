// Window Function Evaluator
//
// Drains its upstream completely, groups rows into partitions in order of first
// appearance, orders each partition, runs the window functions over it and then
// streams the results. Output rows are the input values followed by one value
// per window function.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use linked_hash_map::LinkedHashMap;
use log::{debug, warn};

use crate::common::config::ExecutionConfig;
use crate::query::executor::batch_iterator::{BatchIterator, BatchLoad, IteratorState, LoadOutcome, MoveNext};
use crate::query::executor::ram_accounting::{ChargedBytes, RamAccountingContext};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::window::function::WindowFunction;
use crate::query::executor::window::ordering::RowComparator;
use crate::query::executor::window::partition::PartitionBy;
use crate::query::executor::window::WindowDefinition;

/// Rows of one partition plus the bytes charged for them
#[derive(Debug, Default)]
struct Partition {
    rows: VecDeque<Row>,
    bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Still pulling rows from upstream
    Draining,
    /// Results computed, handing them out
    Emitting,
}

pub struct WindowBatchIterator {
    upstream: Box<dyn BatchIterator>,
    partition_by: PartitionBy,
    comparator: Option<RowComparator>,
    functions: Vec<Box<dyn WindowFunction>>,
    buffers: LinkedHashMap<Vec<DataValue>, Partition>,
    output: VecDeque<Partition>,
    charged: ChargedBytes,
    phase: Phase,
    current: Option<Row>,
    state: IteratorState,
    thread_name: String,
}

impl WindowBatchIterator {
    pub fn new(
        upstream: Box<dyn BatchIterator>,
        partition_by: PartitionBy,
        comparator: Option<RowComparator>,
        functions: Vec<Box<dyn WindowFunction>>,
        ram: Arc<RamAccountingContext>,
        thread_name: impl Into<String>,
    ) -> QueryResult<Self> {
        if functions.is_empty() {
            return Err(QueryError::ExecutionError(
                "Window evaluation needs at least one function".to_string(),
            ));
        }
        Ok(Self {
            upstream,
            partition_by,
            comparator,
            functions,
            buffers: LinkedHashMap::new(),
            output: VecDeque::new(),
            charged: ChargedBytes::new(ram),
            phase: Phase::Draining,
            current: None,
            state: IteratorState::Open,
            thread_name: thread_name.into(),
        })
    }

    /// Build from an OVER clause; keys without a null placement use the configured default
    pub fn from_definition(
        upstream: Box<dyn BatchIterator>,
        definition: WindowDefinition,
        functions: Vec<Box<dyn WindowFunction>>,
        ram: Arc<RamAccountingContext>,
        config: &ExecutionConfig,
    ) -> QueryResult<Self> {
        Self::new(
            upstream,
            PartitionBy::new(definition.partition_by),
            RowComparator::from_order_by(definition.order_by, config.null_ordering),
            functions,
            ram,
            config.loader_thread_name.clone(),
        )
    }

    /// Pull upstream rows until it is exhausted.
    ///
    /// Returns the upstream's load when it is still running; draining resumes on
    /// the next call.
    fn drain(&mut self) -> QueryResult<Option<BatchLoad>> {
        loop {
            match self.upstream.move_next()? {
                MoveNext::Advanced => {
                    let row = self.upstream.current_element()?.clone();
                    self.buffer(row)?;
                }
                MoveNext::Exhausted => return Ok(None),
                MoveNext::NeedsLoad => {
                    let mut load = self.upstream.load_next_batch();
                    match load.try_complete() {
                        Some(result) => {
                            result?;
                        }
                        None => return Ok(Some(load)),
                    }
                }
            }
        }
    }

    fn buffer(&mut self, row: Row) -> QueryResult<()> {
        let key = self.partition_by.key(&row)?;
        let size = row.estimated_size();
        self.charged.charge(size)?;
        if let Some(partition) = self.buffers.get_mut(&key) {
            partition.rows.push_back(row);
            partition.bytes += size;
        } else {
            let mut partition = Partition::default();
            partition.rows.push_back(row);
            partition.bytes = size;
            self.buffers.insert(key, partition);
        }
        Ok(())
    }

    fn compute_partitions(&mut self) -> QueryResult<()> {
        let buffers = mem::replace(&mut self.buffers, LinkedHashMap::new());
        let num_partitions = buffers.len();

        for (_, partition) in buffers {
            let Partition { rows, bytes } = partition;
            let rows: Vec<Row> = rows.into();
            let rows = match &self.comparator {
                Some(comparator) => comparator.sort(rows)?,
                None => rows,
            };

            for function in self.functions.iter_mut() {
                function.reset();
            }
            let mut computed = Partition { rows: VecDeque::with_capacity(rows.len()), bytes };
            for row in rows {
                let values = self
                    .functions
                    .iter_mut()
                    .map(|f| f.compute(&row))
                    .collect::<QueryResult<Vec<DataValue>>>()?;
                let out = row.appended(values);
                let extra = out.estimated_size().saturating_sub(row.estimated_size());
                self.charged.charge(extra)?;
                computed.bytes += extra;
                computed.rows.push_back(out);
            }
            self.output.push_back(computed);
        }

        debug!("Computed {} window partitions ({} bytes held)", num_partitions, self.charged.bytes());
        Ok(())
    }

    fn fail(&mut self, error: QueryError) -> QueryError {
        self.current = None;
        self.state = IteratorState::Failed(error.clone());
        error
    }
}

impl BatchIterator for WindowBatchIterator {
    fn move_next(&mut self) -> QueryResult<MoveNext> {
        self.state.check_usable()?;
        if self.state == IteratorState::Exhausted {
            return Ok(MoveNext::Exhausted);
        }
        if self.phase == Phase::Draining {
            self.current = None;
            return Ok(MoveNext::NeedsLoad);
        }

        while let Some(partition) = self.output.front_mut() {
            let Some(row) = partition.rows.pop_front() else {
                let bytes = partition.bytes;
                self.output.pop_front();
                self.charged.release(bytes);
                continue;
            };
            if partition.rows.is_empty() {
                // last row of the partition handed out
                let bytes = partition.bytes;
                self.output.pop_front();
                self.charged.release(bytes);
            }
            self.current = Some(row);
            return Ok(MoveNext::Advanced);
        }

        self.current = None;
        self.state = IteratorState::Exhausted;
        Ok(MoveNext::Exhausted)
    }

    fn current_element(&self) -> QueryResult<&Row> {
        self.current
            .as_ref()
            .ok_or_else(|| QueryError::IllegalState("no current row".to_string()))
    }

    fn load_next_batch(&mut self) -> BatchLoad {
        if let Err(e) = self.state.check_usable() {
            return BatchLoad::failed(e);
        }
        if self.phase != Phase::Draining {
            return BatchLoad::ready(LoadOutcome::Exhausted);
        }

        match self.drain() {
            Ok(Some(pending)) => return pending.into_progress(&self.thread_name),
            Ok(None) => {}
            Err(e) => return BatchLoad::failed(self.fail(e)),
        }
        if let Err(e) = self.compute_partitions() {
            return BatchLoad::failed(self.fail(e));
        }
        self.phase = Phase::Emitting;
        BatchLoad::ready(LoadOutcome::Exhausted)
    }

    fn all_loaded(&self) -> bool {
        self.phase != Phase::Draining
    }

    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()> {
        if !self.state.close(error) {
            return Ok(());
        }
        let reason = match &self.state {
            IteratorState::Closed(reason) => reason.clone(),
            _ => None,
        };

        self.buffers.clear();
        self.output.clear();
        self.current = None;
        let released = self.charged.bytes();
        self.charged.release_all();

        match &reason {
            Some(e) => warn!("Window evaluator closed after failure: {} (released {} bytes)", e, released),
            None => debug!("Window evaluator closed, released {} bytes", released),
        }
        self.upstream.close(reason)
    }
}
