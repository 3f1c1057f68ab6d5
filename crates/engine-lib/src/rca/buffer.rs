//! Bounded log buffer for root-cause correlation
//!
//! Keeps the most recent log records in arrival order with FIFO eviction.
//! Appends and evictions happen under one write lock, so a correlation scan
//! never observes a half-applied mutation.

use crate::models::LogRecord;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// Default number of log records retained
pub const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;

/// Fixed-capacity ring of recent log records
#[derive(Debug)]
pub struct LogCorrelationBuffer {
    records: RwLock<VecDeque<LogRecord>>,
    capacity: usize,
}

impl LogCorrelationBuffer {
    /// Create a buffer holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
        }
    }

    /// Append a record, evicting the oldest ones if the buffer is full
    pub fn push(&self, record: LogRecord) {
        if self.capacity == 0 {
            return;
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Append multiple records in order
    pub fn push_batch(&self, batch: impl IntoIterator<Item = LogRecord>) {
        for record in batch {
            self.push(record);
        }
    }

    /// Visit records newest-first until `visit` returns false
    ///
    /// The read lock is held for the whole scan.
    pub fn scan_newest_first<F>(&self, mut visit: F)
    where
        F: FnMut(&LogRecord) -> bool,
    {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        for record in records.iter().rev() {
            if !visit(record) {
                break;
            }
        }
    }

    /// Copy of the buffer contents, oldest first
    pub fn snapshot(&self) -> Vec<LogRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogCorrelationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_BUFFER_CAPACITY)
    }
}
