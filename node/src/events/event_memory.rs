// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory transaction logger.
//!
//! Same contract as the file logger, with records kept in a shared
//! `Vec<Event>`. Cloning the handle lets a second logger "restart" over the
//! records the first one persisted. An optional append budget turns the
//! backend into a failing one after N records.

use crate::events::transaction_log::{
    lock, next_sequence, ErrorReceiver, EventLogError, EventReceiver, Result, SequenceCheck,
    TransactionLogger,
};
use async_trait::async_trait;
use kvlog_kernel::Event;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type SharedRecords = Arc<Mutex<Vec<Event>>>;

pub struct MemoryTransactionLogger {
    records: SharedRecords,
    queue_capacity: usize,
    fail_after: Option<usize>,
    events: Mutex<Option<mpsc::Sender<Event>>>,
    errors: Mutex<Option<ErrorReceiver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_sequence: Arc<AtomicU64>,
    replaying: Arc<AtomicBool>,
    started: AtomicBool,
}

impl Default for MemoryTransactionLogger {
    fn default() -> Self {
        Self::with_shared(Arc::new(Mutex::new(Vec::new())))
    }
}

impl MemoryTransactionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing records, taken as-is (no validation until replay).
    pub fn with_records(records: Vec<Event>) -> Self {
        Self::with_shared(Arc::new(Mutex::new(records)))
    }

    pub fn with_shared(records: SharedRecords) -> Self {
        Self {
            records,
            queue_capacity: 16,
            fail_after: None,
            events: Mutex::new(None),
            errors: Mutex::new(None),
            worker: Mutex::new(None),
            last_sequence: Arc::new(AtomicU64::new(0)),
            replaying: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
        }
    }

    /// Fail every append once the backend holds `limit` records.
    pub fn fail_after(mut self, limit: usize) -> Self {
        self.fail_after = Some(limit);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn shared(&self) -> SharedRecords {
        Arc::clone(&self.records)
    }

    pub fn records(&self) -> Vec<Event> {
        lock(&self.records).clone()
    }

    async fn enqueue(&self, event: Event) -> Result<()> {
        let sender = lock(&self.events).clone();
        let Some(sender) = sender else {
            return Err(if self.started.load(Ordering::SeqCst) {
                EventLogError::Stopped
            } else {
                EventLogError::NotRunning
            });
        };

        sender.send(event).await.map_err(|_| EventLogError::Stopped)
    }
}

async fn persist_to_memory(
    records: SharedRecords,
    mut events: mpsc::Receiver<Event>,
    errors: mpsc::Sender<EventLogError>,
    last_sequence: Arc<AtomicU64>,
    fail_after: Option<usize>,
) {
    let mut sequence = last_sequence.load(Ordering::SeqCst);

    while let Some(mut event) = events.recv().await {
        let outcome = next_sequence(sequence).and_then(|next| {
            event.sequence = next;
            event.encode().map_err(EventLogError::Encode)
        });
        let outcome = outcome.and_then(|_| {
            let mut records = lock(&records);
            match fail_after {
                Some(limit) if records.len() >= limit => Err(EventLogError::Backend(format!(
                    "append budget of {} records exhausted",
                    limit
                ))),
                _ => {
                    records.push(event.clone());
                    Ok(())
                }
            }
        });

        if let Err(e) = outcome {
            tracing::error!("Memory log append failed after sequence {}: {}", sequence, e);
            let _ = errors.try_send(e);
            return;
        }

        sequence = event.sequence;
        last_sequence.store(sequence, Ordering::SeqCst);
        metrics::counter!("kvlog_events_written_total", 1);
    }
}

#[async_trait]
impl TransactionLogger for MemoryTransactionLogger {
    async fn write_put(&self, key: &str, value: &str) -> Result<()> {
        self.enqueue(Event::put(key, value)).await
    }

    async fn write_delete(&self, key: &str) -> Result<()> {
        self.enqueue(Event::delete(key)).await
    }

    fn err(&self) -> Option<ErrorReceiver> {
        lock(&self.errors).take()
    }

    fn read_events(&self) -> Result<(EventReceiver, ErrorReceiver)> {
        if self.started.load(Ordering::SeqCst) {
            return Err(EventLogError::AlreadyRunning);
        }
        if self.replaying.swap(true, Ordering::SeqCst) {
            return Err(EventLogError::ReplayInProgress);
        }

        let snapshot = lock(&self.records).clone();
        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let last_sequence = Arc::clone(&self.last_sequence);
        let replaying = Arc::clone(&self.replaying);

        tokio::spawn(async move {
            let mut check = SequenceCheck::new();
            for event in snapshot {
                check.next_position();
                if let Err(e) = check.observe(event.sequence) {
                    let _ = error_tx.try_send(e);
                    break;
                }
                last_sequence.fetch_max(event.sequence, Ordering::SeqCst);
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }

            replaying.store(false, Ordering::SeqCst);
            drop(event_tx);
            drop(error_tx);
        });

        Ok((event_rx, error_rx))
    }

    fn run(&self) -> Result<()> {
        if self.replaying.load(Ordering::SeqCst) {
            return Err(EventLogError::ReplayInProgress);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EventLogError::AlreadyRunning);
        }

        let (event_tx, event_rx) = mpsc::channel(self.queue_capacity);
        let (error_tx, error_rx) = mpsc::channel(1);
        *lock(&self.events) = Some(event_tx);
        *lock(&self.errors) = Some(error_rx);

        let handle = tokio::spawn(persist_to_memory(
            Arc::clone(&self.records),
            event_rx,
            error_tx,
            Arc::clone(&self.last_sequence),
            self.fail_after,
        ));
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let sender = lock(&self.events).take();
        drop(sender);

        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| EventLogError::Worker(e.to_string()))?;
        }
        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }
}
