// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The transaction logger capability.
//!
//! A logger accepts writes asynchronously, assigns sequence numbers in queue
//! order, persists events durably, and can replay everything it persisted.
//!
//! # Lifecycle
//! ```text
//! open ──► read_events (drain fully) ──► run ──► write_* ... ──► close
//!                                          │
//!                                          └──► err() yields at most one fatal error
//! ```
//!
//! # Queue policy
//! Writes wait while the queue is full. Once the worker has failed or the
//! logger was closed, writes are rejected with [`EventLogError::Stopped`]
//! instead of blocking forever.

use async_trait::async_trait;
use kvlog_kernel::{Event, EventError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input parse error at record {position}: {source}")]
    Malformed { position: u64, source: EventError },

    #[error("transaction number out of sequence at record {position}: {found} after {last}")]
    OutOfSequence { position: u64, last: u64, found: u64 },

    #[error("record encoding failed: {0}")]
    Encode(EventError),

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("sequence space exhausted after {last}")]
    SequenceExhausted { last: u64 },

    #[error("logger is not running")]
    NotRunning,

    #[error("logger is already running")]
    AlreadyRunning,

    #[error("replay still in progress")]
    ReplayInProgress,

    #[error("logger stopped; write not accepted")]
    Stopped,

    #[error("log worker terminated abnormally: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, EventLogError>;

/// Ordered stream of replayed events.
pub type EventReceiver = mpsc::Receiver<Event>;

/// Carries at most one terminal error.
pub type ErrorReceiver = mpsc::Receiver<EventLogError>;

/// Controls when appended records are fsync'd.
///
/// Records are always flushed to the OS after each append; this only
/// governs the `fsync` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every append.
    EveryWrite,
    /// Fsync every N appends.
    EveryN(usize),
    /// Fsync only when the logger is closed.
    OnClose,
}

#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Pending-write queue capacity. Writers wait when it is full.
    pub queue_capacity: usize,
    pub fsync_policy: FsyncPolicy,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

/// Durable, strictly ordered sink for store mutations.
///
/// Implementations own their storage exclusively. Sequence numbers are
/// assigned by a single worker in queue order, never by callers.
#[async_trait]
pub trait TransactionLogger: Send + Sync + 'static {
    /// Enqueue a Put. Waits only while the queue is full.
    async fn write_put(&self, key: &str, value: &str) -> Result<()>;

    /// Enqueue a Delete. Same contract as [`write_put`](Self::write_put).
    async fn write_delete(&self, key: &str) -> Result<()>;

    /// Take the receiver on which the worker reports its one fatal error.
    ///
    /// Returns `None` before [`run`](Self::run) or once taken.
    fn err(&self) -> Option<ErrorReceiver>;

    /// Start a forward-only scan of everything persisted so far.
    ///
    /// Events arrive in persisted order. The error receiver yields at most
    /// one terminal error, after which the event stream closes. The scan
    /// updates [`last_sequence`](Self::last_sequence) as it goes.
    fn read_events(&self) -> Result<(EventReceiver, ErrorReceiver)>;

    /// Start the writer. Call once, after any replay has been drained.
    fn run(&self) -> Result<()>;

    /// Stop accepting writes, drain the queue and release storage.
    async fn close(&self) -> Result<()>;

    /// Last sequence issued by the writer or validated by a replay.
    fn last_sequence(&self) -> u64;
}

/// Sequence number for the record following `last`.
pub(crate) fn next_sequence(last: u64) -> Result<u64> {
    last.checked_add(1).ok_or(EventLogError::SequenceExhausted { last })
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks monotonic non-decrease of sequence numbers during one read pass.
#[derive(Debug, Default)]
pub(crate) struct SequenceCheck {
    highest: u64,
    position: u64,
}

impl SequenceCheck {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Position (1-based) of the record about to be checked.
    pub(crate) fn next_position(&mut self) -> u64 {
        self.position += 1;
        self.position
    }

    pub(crate) fn observe(&mut self, sequence: u64) -> Result<u64> {
        if sequence < self.highest {
            return Err(EventLogError::OutOfSequence {
                position: self.position,
                last: self.highest,
                found: sequence,
            });
        }
        self.highest = sequence;
        Ok(sequence)
    }

    pub(crate) fn highest(&self) -> u64 {
        self.highest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_check_allows_equal_and_increasing() {
        let mut check = SequenceCheck::new();
        for seq in [1, 2, 2, 5, 9] {
            check.next_position();
            check.observe(seq).unwrap();
        }
        assert_eq!(check.highest(), 9);
    }

    #[test]
    fn test_sequence_check_rejects_decrease() {
        let mut check = SequenceCheck::new();
        check.next_position();
        check.observe(4).unwrap();
        check.next_position();
        match check.observe(3) {
            Err(EventLogError::OutOfSequence { position, last, found }) => {
                assert_eq!((position, last, found), (2, 4, 3));
            }
            other => panic!("Expected OutOfSequence, got {:?}", other),
        }
    }

    #[test]
    fn test_next_sequence_stops_at_max() {
        assert_eq!(next_sequence(0).unwrap(), 1);
        assert!(matches!(
            next_sequence(u64::MAX),
            Err(EventLogError::SequenceExhausted { last: u64::MAX })
        ));
    }

    #[test]
    fn test_default_config() {
        let config = EventLogConfig::default();
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.fsync_policy, FsyncPolicy::EveryWrite);
    }
}
