// Batch Iterator
//
// The pull-based interface every pipeline stage implements and consumes.
// A consumer advances with `move_next`; when a stage has no buffered rows it
// answers `NeedsLoad` and the consumer asks for more with `load_next_batch`,
// which hands back a task that may still be running on a worker thread.

use std::thread;

use crossbeam::channel::{self, Receiver, TryRecvError};
use log::{debug, warn};

use crate::query::executor::ram_accounting::RamAccountingContext;
use crate::query::executor::result::{QueryError, QueryResult, Row};

/// Outcome of advancing the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveNext {
    /// A new current row is available
    Advanced,
    /// No more rows; repeated calls keep answering `Exhausted`
    Exhausted,
    /// Buffered rows are used up; call `load_next_batch` and retry
    NeedsLoad,
}

/// What a completed batch load reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// More rows may be available after this load
    MayHaveMore,
    /// Everything has been loaded
    Exhausted,
}

/// Handle to a (possibly still running) batch load.
///
/// Dropping a pending handle abandons the load; the worker notices on send and
/// drops whatever it produced.
#[derive(Debug)]
pub enum BatchLoad {
    Ready(QueryResult<LoadOutcome>),
    Pending(Receiver<QueryResult<LoadOutcome>>),
}

impl BatchLoad {
    pub fn ready(outcome: LoadOutcome) -> Self {
        BatchLoad::Ready(Ok(outcome))
    }

    pub fn failed(error: QueryError) -> Self {
        BatchLoad::Ready(Err(error))
    }

    /// Run `work` on a named worker thread
    pub fn spawn<F>(thread_name: &str, work: F) -> Self
    where
        F: FnOnce() -> QueryResult<LoadOutcome> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let spawned = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                // The receiver may be gone if the load was abandoned
                let _ = tx.send(work());
            });
        match spawned {
            Ok(_) => BatchLoad::Pending(rx),
            Err(e) => BatchLoad::failed(QueryError::ExecutionError(format!(
                "Failed to spawn batch loader thread: {}", e
            ))),
        }
    }

    /// Poll the load without blocking. Returns `None` while it is still running.
    pub fn try_complete(&mut self) -> Option<QueryResult<LoadOutcome>> {
        match self {
            BatchLoad::Ready(result) => Some(result.clone()),
            BatchLoad::Pending(rx) => match rx.try_recv() {
                Ok(result) => {
                    *self = BatchLoad::Ready(result.clone());
                    Some(result)
                }
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    let result = Err(QueryError::ExecutionError(
                        "Batch loader terminated without a result".to_string(),
                    ));
                    *self = BatchLoad::Ready(result.clone());
                    Some(result)
                }
            },
        }
    }

    /// Report any successful completion as `MayHaveMore`.
    ///
    /// Used by stages that suspend on an upstream load: the upstream being
    /// exhausted says nothing about the stage's own output.
    pub fn into_progress(self, thread_name: &str) -> Self {
        match self {
            BatchLoad::Ready(result) => BatchLoad::Ready(result.map(|_| LoadOutcome::MayHaveMore)),
            pending @ BatchLoad::Pending(_) => BatchLoad::spawn(thread_name, move || {
                pending.wait().map(|_| LoadOutcome::MayHaveMore)
            }),
        }
    }

    /// Block the calling thread until the load finishes
    pub fn wait(self) -> QueryResult<LoadOutcome> {
        match self {
            BatchLoad::Ready(result) => result,
            BatchLoad::Pending(rx) => rx.recv().unwrap_or_else(|_| {
                Err(QueryError::ExecutionError(
                    "Batch loader terminated without a result".to_string(),
                ))
            }),
        }
    }
}

/// The BatchIterator trait defines the single-consumer, pull-based contract every
/// execution stage implements.
pub trait BatchIterator: Send {
    /// Advance the cursor by one row
    fn move_next(&mut self) -> QueryResult<MoveNext>;

    /// The row at the cursor. Fails unless the last `move_next` returned `Advanced`.
    fn current_element(&self) -> QueryResult<&Row>;

    /// Request more rows. Loading again once everything is loaded is a no-op.
    fn load_next_batch(&mut self) -> BatchLoad;

    /// True once no further `load_next_batch` can produce rows
    fn all_loaded(&self) -> bool;

    /// Release all resources, including owned upstream iterators, exactly once.
    /// `Some(error)` turns the error into the terminal failure reason.
    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()>;
}

impl<T: BatchIterator + ?Sized> BatchIterator for Box<T> {
    fn move_next(&mut self) -> QueryResult<MoveNext> {
        (**self).move_next()
    }

    fn current_element(&self) -> QueryResult<&Row> {
        (**self).current_element()
    }

    fn load_next_batch(&mut self) -> BatchLoad {
        (**self).load_next_batch()
    }

    fn all_loaded(&self) -> bool {
        (**self).all_loaded()
    }

    fn close(&mut self, error: Option<QueryError>) -> QueryResult<()> {
        (**self).close(error)
    }
}

/// Lifecycle bookkeeping shared by iterator implementations
#[derive(Debug, Clone, PartialEq, Default)]
pub enum IteratorState {
    #[default]
    Open,
    Exhausted,
    /// Terminal failure; resources are still held until `close`
    Failed(QueryError),
    /// Closed, with the kill reason if there was one
    Closed(Option<QueryError>),
}

impl IteratorState {
    /// Error to report when the iterator can no longer advance, if any
    pub fn check_usable(&self) -> QueryResult<()> {
        match self {
            IteratorState::Failed(e) | IteratorState::Closed(Some(e)) => Err(e.clone()),
            IteratorState::Closed(None) => Err(QueryError::IllegalState("iterator is closed".to_string())),
            _ => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, IteratorState::Closed(_))
    }

    /// Transition for `close`; returns false if the iterator was already closed.
    /// An earlier failure stays the terminal reason when no error is given.
    pub fn close(&mut self, error: Option<QueryError>) -> bool {
        if self.is_closed() {
            return false;
        }
        let previous = std::mem::take(self);
        let reason = match (error, previous) {
            (Some(e), _) => Some(e),
            (None, IteratorState::Failed(e)) => Some(e),
            (None, _) => None,
        };
        *self = IteratorState::Closed(reason);
        true
    }
}

/// Drive `iterator` to exhaustion and return every row it produced.
///
/// The iterator is closed exactly once: cleanly on success, with the failure
/// as reason otherwise.
pub fn collect_rows<I: BatchIterator + ?Sized>(iterator: &mut I) -> QueryResult<Vec<Row>> {
    let mut rows = Vec::new();
    match drive(iterator, &mut rows) {
        Ok(()) => {
            iterator.close(None)?;
            Ok(rows)
        }
        Err(e) => {
            warn!("Closing iterator after failure: {}", e);
            let _ = iterator.close(Some(e.clone()));
            Err(e)
        }
    }
}

/// Run a query's top-level iterator to the end, then tear down the query's
/// accounting context whatever the outcome.
pub fn execute_query<I: BatchIterator + ?Sized>(
    iterator: &mut I,
    ram: &RamAccountingContext,
) -> QueryResult<Vec<Row>> {
    let result = collect_rows(iterator);
    let outstanding = ram.close();
    if outstanding > 0 {
        warn!("Accounting context [{}] torn down with {} of {} bytes still charged",
            ram.name(), outstanding, ram.limit());
    }
    result
}

fn drive<I: BatchIterator + ?Sized>(iterator: &mut I, rows: &mut Vec<Row>) -> QueryResult<()> {
    loop {
        match iterator.move_next()? {
            MoveNext::Advanced => rows.push(iterator.current_element()?.clone()),
            MoveNext::Exhausted => {
                debug!("Collected {} rows", rows.len());
                return Ok(());
            }
            MoveNext::NeedsLoad => {
                iterator.load_next_batch().wait()?;
            }
        }
    }
}
