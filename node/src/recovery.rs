// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Crash Recovery
//!
//! Rebuilds the store by replaying the transaction log before any new write
//! is accepted.
//!
//! # Protocol
//! 1. Start the logger's replay scan
//! 2. Apply every event to the store in order, consuming eagerly
//! 3. Abort on the first replay error; the partially built store is discarded
//! 4. Report event count, highest sequence and the resulting store digest

use kvlog_kernel::verify::{short_hex, store_digest};
use kvlog_kernel::Store;
use std::time::Instant;

use crate::errors::EngineError;
use crate::events::TransactionLogger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: u64,
    pub last_sequence: u64,
    pub digest: [u8; 32],
}

/// Drain the logger's replay stream into `store`.
pub async fn replay_into<L>(logger: &L, store: &Store) -> Result<ReplaySummary, EngineError>
where
    L: TransactionLogger + ?Sized,
{
    let start = Instant::now();
    let (mut events, mut errors) = logger.read_events().map_err(EngineError::Replay)?;
    let mut applied = 0u64;

    loop {
        tokio::select! {
            biased;
            Some(err) = errors.recv() => return Err(EngineError::Replay(err)),
            next = events.recv() => match next {
                Some(event) => {
                    store.apply(&event);
                    applied += 1;
                }
                None => break,
            },
        }
    }

    // An error may be queued just before the event stream closed.
    if let Some(err) = errors.recv().await {
        return Err(EngineError::Replay(err));
    }

    metrics::histogram!("kvlog_replay_duration_seconds", start.elapsed().as_secs_f64());
    metrics::counter!("kvlog_events_replayed_total", applied);

    let summary = ReplaySummary {
        events: applied,
        last_sequence: logger.last_sequence(),
        digest: store_digest(store),
    };

    tracing::info!(
        "Replayed {} events (last sequence {}, {} keys, digest {}) in {:?}",
        summary.events,
        summary.last_sequence,
        store.len(),
        short_hex(&summary.digest),
        start.elapsed()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLogError, MemoryTransactionLogger};
    use kvlog_kernel::Event;

    #[tokio::test]
    async fn test_replay_applies_in_order() {
        let logger = MemoryTransactionLogger::with_records(vec![
            Event::put("a", "1").with_sequence(1),
            Event::put("a", "2").with_sequence(2),
            Event::put("b", "3").with_sequence(3),
            Event::delete("b").with_sequence(4),
        ]);
        let store = Store::new();

        let summary = replay_into(&logger, &store).await.unwrap();
        assert_eq!(summary.events, 4);
        assert_eq!(summary.last_sequence, 4);
        assert_eq!(store.get("a").unwrap(), "2");
        assert!(store.get("b").is_err());
    }

    #[tokio::test]
    async fn test_replay_aborts_on_decrease() {
        let logger = MemoryTransactionLogger::with_records(vec![
            Event::put("a", "1").with_sequence(2),
            Event::put("b", "2").with_sequence(1),
        ]);
        let store = Store::new();

        let err = replay_into(&logger, &store).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Replay(EventLogError::OutOfSequence { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_replay() {
        let logger = MemoryTransactionLogger::new();
        let store = Store::new();

        let summary = replay_into(&logger, &store).await.unwrap();
        assert_eq!(summary.events, 0);
        assert_eq!(summary.last_sequence, 0);
        assert!(store.is_empty());
    }
}
