// Memory Accounting
//
// A per-query byte counter every row materialization point charges against.
// Tripping the limit is terminal for the query; nothing here retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{debug, error};

use crate::query::executor::result::{QueryError, QueryResult};

/// Shared accounting context for one query execution
#[derive(Debug)]
pub struct RamAccountingContext {
    name: String,
    limit: usize,
    used: AtomicUsize,
    closed: AtomicBool,
}

impl RamAccountingContext {
    pub fn new(name: impl Into<String>, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            limit,
            used: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// A context that never trips; useful for tests and internal queries
    pub fn unbounded(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, usize::MAX)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Charge `bytes` against the limit.
    ///
    /// The charge is all-or-nothing: if it would exceed the limit the counter is left
    /// untouched and `MemoryLimitExceeded` is returned.
    pub fn charge(&self, bytes: usize) -> QueryResult<()> {
        if self.is_closed() {
            return Err(QueryError::IllegalState(format!(
                "accounting context [{}] is closed", self.name
            )));
        }

        let mut current = self.used.load(Ordering::Acquire);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.limit => next,
                _ => {
                    error!("Accounting context [{}] tripped: requested {} bytes, used {} of {}",
                        self.name, bytes, current, self.limit);
                    return Err(QueryError::MemoryLimitExceeded {
                        context: self.name.clone(),
                        requested: bytes,
                        used: current,
                        limit: self.limit,
                    });
                }
            };
            match self.used.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Give back previously charged bytes. Never underflows.
    pub fn release(&self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let _ = self.used.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            Some(current.saturating_sub(bytes))
        });
    }

    /// Tear the context down. Returns the bytes still charged at that point.
    /// Only the first call has an effect.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let outstanding = self.used.swap(0, Ordering::AcqRel);
        debug!("Closed accounting context [{}] with {} bytes outstanding", self.name, outstanding);
        outstanding
    }
}

/// Bytes charged by one component, released exactly once.
#[derive(Debug)]
pub struct ChargedBytes {
    context: Arc<RamAccountingContext>,
    bytes: usize,
}

impl ChargedBytes {
    pub fn new(context: Arc<RamAccountingContext>) -> Self {
        Self { context, bytes: 0 }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn charge(&mut self, bytes: usize) -> QueryResult<()> {
        self.context.charge(bytes)?;
        self.bytes += bytes;
        Ok(())
    }

    /// Release part of what this holder charged
    pub fn release(&mut self, bytes: usize) {
        let bytes = bytes.min(self.bytes);
        self.context.release(bytes);
        self.bytes -= bytes;
    }

    pub fn release_all(&mut self) {
        let bytes = self.bytes;
        self.release(bytes);
    }
}

impl Drop for ChargedBytes {
    fn drop(&mut self) {
        self.release_all();
    }
}
