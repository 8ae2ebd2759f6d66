// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Replay - sequential scan of the text log
//!
//! # Protocol
//! 1. Open the log from the beginning
//! 2. Decode each line with the inverse of the write encoding
//! 3. Reject any sequence lower than the highest seen in this pass
//! 4. Publish the highest sequence so the writer continues from it
//! 5. Hand each event to the consumer before reading the next line
//!
//! # Invariants
//! - Malformed record → fail closed, nothing after it is produced
//! - Sequence decrease → fail closed, nothing after it is produced
//! - Unterminated final line (torn write) → malformed, fail closed
//! - Clean EOF → stream ends without error

use crate::events::transaction_log::{EventLogError, Result, SequenceCheck};
use kvlog_kernel::Event;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scan `reader` line by line, handing each valid event to `emit`.
///
/// `emit` returns `false` when the consumer has gone away; the scan then stops
/// quietly. Returns the number of events emitted.
pub fn scan_log<R, F>(mut reader: R, last_sequence: &AtomicU64, mut emit: F) -> Result<u64>
where
    R: BufRead,
    F: FnMut(Event) -> bool,
{
    let mut check = SequenceCheck::new();
    let mut line = String::new();
    let mut emitted = 0;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }

        let position = check.next_position();
        let event = Event::decode(&line)
            .map_err(|source| EventLogError::Malformed { position, source })?;

        let sequence = check.observe(event.sequence)?;
        last_sequence.fetch_max(sequence, Ordering::SeqCst);

        if !emit(event) {
            tracing::warn!("Replay consumer dropped after {} events", emitted);
            break;
        }
        emitted += 1;
    }

    tracing::debug!(
        "Log scan finished: {} events, highest sequence {}",
        emitted,
        check.highest()
    );
    Ok(emitted)
}

/// Read a whole log file into memory.
///
/// Used by tooling and tests; the service replays through
/// [`TransactionLogger::read_events`](crate::events::TransactionLogger::read_events).
pub fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let file = File::open(path.as_ref())?;
    let last_sequence = AtomicU64::new(0);
    let mut events = Vec::new();

    scan_log(BufReader::new(file), &last_sequence, |event| {
        events.push(event);
        true
    })?;

    Ok(events)
}
