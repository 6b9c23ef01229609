// Row Sources
//
// Leaf iterators that are not backed by the columnar index: a vector of rows
// (optionally handed out page by page) and a channel fed by a producer thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;
use log::debug;
use parking_lot::Mutex;

use crate::query::executor::batch_iterator::{BatchIterator, BatchLoad, IteratorState, LoadOutcome, MoveNext};
use crate::query::executor::result::{QueryError, QueryResult, Row};

/// Iterates rows held in memory.
///
/// With a page size, only `page_size` rows become visible per `load_next_batch`,
/// so consumers see `NeedsLoad` between pages.
pub struct InMemoryBatchIterator {
    rows: Vec<Row>,
    next_index: usize,
    loaded_until: usize,
    page_size: Option<usize>,
    current: Option<usize>,
    state: IteratorState,
}

impl InMemoryBatchIterator {
    /// All rows are visible immediately
    pub fn new(rows: Vec<Row>) -> Self {
        let loaded_until = rows.len();
        Self {
            rows,
            next_index: 0,
            loaded_until,
            page_size: None,
            current: None,
            state: IteratorState::Open,
        }
    }

    /// Rows become visible `page_size` at a time
    pub fn paged(rows: Vec<Row>, page_size: usize) -> Self {
        Self {
            rows,
            next_index: 0,
            loaded_until: 0,
            page_size: Some(page_size.max(1)),
            current: None,
            state: IteratorState::Open,
        }
    }
}

impl BatchIterator for InMemoryBatchIterator {
    fn move_next(&mut self) -> QueryResult<MoveNext> {
        self.state.check_usable()?;
        if self.state == IteratorState::Exhausted {
            return Ok(MoveNext::Exhausted);
        }
        if self.next_index < self.loaded_until {
            self.current = Some(self.next_index);
            self.next_index += 1;
            return Ok(MoveNext::Advanced);
        }
        self.current = None;
        if self.all_loaded() {
            self.state = IteratorState::Exhausted;
            Ok(MoveNext::Exhausted)
        } else {
            Ok(MoveNext::NeedsLoad)
        }
    }

    fn current_element(&self) -> QueryResult<&Row> {
        self.current
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| QueryError::IllegalState("no current row".to_string()))
    }

    fn load_next_batch(&mut self) -> BatchLoad {
        if let Err(e) = self.state.check_usable() {
            return BatchLoad::failed(e);
        }
        if self.all_loaded() {
            return BatchLoad::ready(LoadOutcome::Exhausted);
        }
        let page = self.page_size.unwrap_or(self.rows.len());
        self.loaded_until = (self.loaded_until + page).min(self.rows.len());
        if self.all_loaded() {
            BatchLoad::ready(LoadOutcome::Exhausted)
        } else {
            BatchLoad::ready(LoadOutcome::MayHaveMore)
        }
    }

    fn all_loaded(&self) -> bool {
        self.loaded_until >= self.rows.len()
    }

    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()> {
        if self.state.close(error) {
            self.rows.clear();
            self.current = None;
            self.next_index = 0;
            self.loaded_until = 0;
        }
        Ok(())
    }
}

/// Wait for the next batch or a cancellation, whichever comes first.
///
/// A batch that arrives together with a cancellation is dropped; the buffer lock
/// is held across the cancellation check so nothing lands after `close` cleared it.
fn receive_batch(
    batches: &Receiver<QueryResult<Vec<Row>>>,
    cancel: &Receiver<QueryError>,
    buffer: &Mutex<VecDeque<Row>>,
    done: &AtomicBool,
    failure: &Mutex<Option<QueryError>>,
) -> QueryResult<LoadOutcome> {
    select! {
        recv(batches) -> msg => {
            let mut buffer = buffer.lock();
            if let Some(reason) = cancellation(cancel) {
                debug!("Dropping batch received after cancellation");
                return Err(reason);
            }
            match msg {
                Ok(Ok(rows)) => {
                    debug!("Received batch of {} rows", rows.len());
                    buffer.extend(rows);
                    Ok(LoadOutcome::MayHaveMore)
                }
                Ok(Err(e)) => {
                    *failure.lock() = Some(e.clone());
                    Err(e)
                }
                Err(_) => {
                    done.store(true, Ordering::Release);
                    Ok(LoadOutcome::Exhausted)
                }
            }
        },
        recv(cancel) -> reason => Err(reason.unwrap_or_else(|_| closed_while_loading())),
    }
}

/// The kill reason if the iterator was closed, without blocking
fn cancellation(cancel: &Receiver<QueryError>) -> Option<QueryError> {
    match cancel.try_recv() {
        Ok(reason) => Some(reason),
        Err(TryRecvError::Disconnected) => Some(closed_while_loading()),
        Err(TryRecvError::Empty) => None,
    }
}

fn closed_while_loading() -> QueryError {
    QueryError::Cancelled("iterator closed while loading".to_string())
}

/// Sender half used by producers feeding a `ChannelBatchIterator`
pub type BatchSender = Sender<QueryResult<Vec<Row>>>;

/// Iterates row batches pushed by a producer thread.
///
/// Every `load_next_batch` starts a worker that waits for the next batch or for
/// the iterator to be closed, whichever comes first.
pub struct ChannelBatchIterator {
    batches: Receiver<QueryResult<Vec<Row>>>,
    buffer: Arc<Mutex<VecDeque<Row>>>,
    producer_done: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<QueryError>>>,
    cancel_tx: Option<Sender<QueryError>>,
    cancel_rx: Receiver<QueryError>,
    current: Option<Row>,
    state: IteratorState,
    thread_name: String,
}

impl ChannelBatchIterator {
    pub fn new(batches: Receiver<QueryResult<Vec<Row>>>, thread_name: impl Into<String>) -> Self {
        let (cancel_tx, cancel_rx) = channel::unbounded();
        Self {
            batches,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            producer_done: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
            cancel_tx: Some(cancel_tx),
            cancel_rx,
            current: None,
            state: IteratorState::Open,
            thread_name: thread_name.into(),
        }
    }

    /// A bounded channel and the iterator reading from it
    pub fn channel(capacity: usize, thread_name: impl Into<String>) -> (BatchSender, Self) {
        let (tx, rx) = channel::bounded(capacity);
        (tx, Self::new(rx, thread_name))
    }
}

impl BatchIterator for ChannelBatchIterator {
    fn move_next(&mut self) -> QueryResult<MoveNext> {
        self.state.check_usable()?;
        if self.state == IteratorState::Exhausted {
            return Ok(MoveNext::Exhausted);
        }
        if let Some(e) = self.failure.lock().take() {
            self.current = None;
            self.state = IteratorState::Failed(e.clone());
            return Err(e);
        }
        if let Some(row) = self.buffer.lock().pop_front() {
            self.current = Some(row);
            return Ok(MoveNext::Advanced);
        }
        self.current = None;
        if self.all_loaded() {
            self.state = IteratorState::Exhausted;
            Ok(MoveNext::Exhausted)
        } else {
            Ok(MoveNext::NeedsLoad)
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

        let batches = self.batches.clone();
        let cancel = self.cancel_rx.clone();
        let buffer = Arc::clone(&self.buffer);
        let done = Arc::clone(&self.producer_done);
        let failure = Arc::clone(&self.failure);

        BatchLoad::spawn(&self.thread_name, move || {
            receive_batch(&batches, &cancel, &buffer, &done, &failure)
        })
    }

    fn all_loaded(&self) -> bool {
        self.producer_done.load(Ordering::Acquire) && self.buffer.lock().is_empty()
    }

    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()> {
        if !self.state.close(error.clone()) {
            return Ok(());
        }
        if let (Some(tx), Some(e)) = (self.cancel_tx.as_ref(), error) {
            let _ = tx.send(e);
        }
        // Dropping the sender wakes any worker still waiting
        self.cancel_tx = None;
        self.buffer.lock().clear();
        self.current = None;
        Ok(())
    }
}
