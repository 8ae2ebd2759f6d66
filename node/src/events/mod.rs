// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event-Sourced Persistence Layer
//!
//! The transaction log is the durable record of every store mutation.
//!
//! # Architecture
//! - Event Log = Truth across restarts (append-only, one record per line)
//! - Store = Truth for the running process
//! - Writer = Single worker draining a bounded queue, assigning sequences
//!
//! # Guarantees
//! - Sequences strictly increase in append order
//! - Replay yields events in persisted order and fails closed on corruption
//! - At most one fatal writer error is reported

pub mod event_log;
pub mod event_memory;
pub mod event_replay;
pub mod transaction_log;

pub use event_log::FileTransactionLogger;
pub use event_memory::MemoryTransactionLogger;
pub use event_replay::read_event_log;
pub use transaction_log::{
    ErrorReceiver, EventLogConfig, EventLogError, EventReceiver, FsyncPolicy, TransactionLogger,
};
