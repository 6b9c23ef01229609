// Columnar Scan Iterator
//
// Leaf of every pipeline reading from the index. Walks matching documents in
// document order, reads the input columns for each one, evaluates the output
// expressions over them and charges the materialized row before exposing it.
// Only the current row stays charged; advancing releases the previous one.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};

use crate::common::config::ExecutionConfig;
use crate::common::types::{Score, ScoredDoc, SegmentOrd};
use crate::query::executor::batch_iterator::{BatchIterator, BatchLoad, IteratorState, LoadOutcome, MoveNext};
use crate::query::executor::collect::column_reference::ColumnReference;
use crate::query::executor::expression_eval::RowExpression;
use crate::query::executor::ram_accounting::{ChargedBytes, RamAccountingContext};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::storage::index::{DocScan, IndexSearcher, Query, SearcherHandle};

pub struct ColumnarScanIterator {
    /// Released on close
    handle: Option<SearcherHandle>,
    query: Query,
    min_score: Option<Score>,
    do_scores: bool,
    /// Started by the first load
    scan: Option<DocScan>,
    pending: VecDeque<ScoredDoc>,
    inputs: Vec<ColumnReference>,
    outputs: Vec<RowExpression>,
    bound_segment: Option<SegmentOrd>,
    charged: ChargedBytes,
    batch_size: usize,
    current: Option<Row>,
    state: IteratorState,
}

impl ColumnarScanIterator {
    /// Create a scan over `searcher`.
    ///
    /// `outputs` are evaluated over the values of `inputs`: `Column(i)` is the
    /// value read by `inputs[i]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        searcher: &IndexSearcher,
        query: Query,
        min_score: Option<Score>,
        do_scores: bool,
        inputs: Vec<ColumnReference>,
        outputs: Vec<RowExpression>,
        ram: Arc<RamAccountingContext>,
        config: &ExecutionConfig,
    ) -> QueryResult<Self> {
        if let Some(max) = outputs.iter().filter_map(RowExpression::max_column).max() {
            if max >= inputs.len() {
                return Err(QueryError::ColumnNotFound(format!(
                    "output refers to input {} but only {} inputs are defined", max, inputs.len()
                )));
            }
        }

        Ok(Self {
            handle: Some(searcher.acquire()),
            query,
            min_score,
            do_scores,
            scan: None,
            pending: VecDeque::new(),
            inputs,
            outputs,
            bound_segment: None,
            charged: ChargedBytes::new(ram),
            batch_size: config.batch_size.max(1),
            current: None,
            state: IteratorState::Open,
        })
    }

    /// Project every input as-is
    pub fn identity_outputs(num_inputs: usize) -> Vec<RowExpression> {
        (0..num_inputs).map(RowExpression::column).collect()
    }

    /// Bytes this scan currently holds against its accounting context
    pub fn charged_bytes(&self) -> usize {
        self.charged.bytes()
    }

    /// Drop the current row and give back what it was charged
    fn release_current(&mut self) {
        self.current = None;
        self.charged.release_all();
    }

    fn materialize(&mut self, doc: &ScoredDoc) -> QueryResult<Row> {
        if self.bound_segment != Some(doc.segment) {
            let handle = self.handle.as_ref()
                .ok_or_else(|| QueryError::IllegalState("searcher handle released".to_string()))?;
            let segment = Arc::clone(handle.reader().segment(doc.segment)?);
            for input in self.inputs.iter_mut() {
                input.set_next_segment(&segment)?;
            }
            self.bound_segment = Some(doc.segment);
            debug!("Scan bound {} inputs to segment {}", self.inputs.len(), doc.segment);
        }

        let mut values = Vec::with_capacity(self.inputs.len());
        for input in self.inputs.iter_mut() {
            input.set_next_doc(doc);
            values.push(input.value()?);
        }

        let row = Row::new(
            self.outputs
                .iter()
                .map(|expr| expr.evaluate(&values))
                .collect::<QueryResult<Vec<DataValue>>>()?,
        );
        self.charged.charge(row.estimated_size())?;
        Ok(row)
    }
}

impl BatchIterator for ColumnarScanIterator {
    fn move_next(&mut self) -> QueryResult<MoveNext> {
        self.state.check_usable()?;
        if self.state == IteratorState::Exhausted {
            return Ok(MoveNext::Exhausted);
        }

        self.release_current();

        let Some(doc) = self.pending.pop_front() else {
            if self.all_loaded() {
                self.state = IteratorState::Exhausted;
                return Ok(MoveNext::Exhausted);
            }
            return Ok(MoveNext::NeedsLoad);
        };

        match self.materialize(&doc) {
            Ok(row) => {
                self.current = Some(row);
                Ok(MoveNext::Advanced)
            }
            Err(e) => {
                self.state = IteratorState::Failed(e.clone());
                Err(e)
            }
        }
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
        if self.all_loaded() {
            return BatchLoad::ready(LoadOutcome::Exhausted);
        }

        if self.scan.is_none() {
            let Some(handle) = self.handle.as_ref() else {
                return BatchLoad::failed(QueryError::IllegalState("searcher handle released".to_string()));
            };
            debug!("Starting scan for {:?} (scores: {}, min_score: {:?})", self.query, self.do_scores, self.min_score);
            self.scan = Some(handle.scan(self.query.clone(), self.do_scores, self.min_score));
        }

        let batch = match self.scan.as_mut() {
            Some(scan) => scan.next_batch(self.batch_size),
            None => Ok(Vec::new()),
        };
        match batch {
            Ok(docs) => {
                self.pending.extend(docs);
                if self.all_loaded() {
                    BatchLoad::ready(LoadOutcome::Exhausted)
                } else {
                    BatchLoad::ready(LoadOutcome::MayHaveMore)
                }
            }
            Err(e) => {
                let e = QueryError::from(e);
                self.state = IteratorState::Failed(e.clone());
                BatchLoad::failed(e)
            }
        }
    }

    fn all_loaded(&self) -> bool {
        self.scan.as_ref().is_some_and(DocScan::is_finished)
    }

    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()> {
        if !self.state.close(error) {
            return Ok(());
        }
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        let released = self.charged.bytes();
        self.release_current();
        self.pending.clear();
        self.scan = None;

        match &self.state {
            IteratorState::Closed(Some(reason)) => {
                warn!("Scan closed after failure: {} (released {} bytes)", reason, released)
            }
            _ => debug!("Scan closed, released {} bytes", released),
        }
        Ok(())
    }
}
