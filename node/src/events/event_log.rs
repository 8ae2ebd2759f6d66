// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-Only Event Log Writer
//!
//! File-backed [`TransactionLogger`]. One dedicated worker drains a bounded
//! FIFO queue, stamps each event with `last_sequence + 1` and appends it as a
//! text record. Being the only consumer of the queue is what keeps sequence
//! assignment ordered without a lock on the counter.
//!
//! # Worker states
//! ```text
//! Idle ──recv──► Appending ──ok──► Idle
//!                    │
//!                    └──io/encode/sequence error──► Failed (error reported once, queue abandoned)
//! ```
//!
//! # File Format
//! ```text
//! 1\t2\tcolor\tblue\n
//! 2\t1\tcolor\t\n
//! ```

use crate::events::event_replay::scan_log;
use crate::events::transaction_log::{
    lock, next_sequence, ErrorReceiver, EventLogConfig, EventLogError, EventReceiver,
    FsyncPolicy, Result, TransactionLogger,
};
use async_trait::async_trait;
use kvlog_kernel::Event;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Destination the worker appends to.
pub trait DurableSink: Write + Send + 'static {
    /// Flush buffers and force data to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableSink for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_all()
    }
}

/// Drain `events` into `sink` until the queue closes or an append fails.
///
/// Runs on a blocking thread. On failure the error is reported once on
/// `errors` and the receiver is dropped, so later writers see
/// [`EventLogError::Stopped`].
pub fn persist_events<S: DurableSink>(
    mut sink: S,
    mut events: mpsc::Receiver<Event>,
    errors: mpsc::Sender<EventLogError>,
    last_sequence: Arc<AtomicU64>,
    policy: FsyncPolicy,
) {
    let mut sequence = last_sequence.load(Ordering::SeqCst);
    let mut since_sync = 0usize;

    tracing::debug!("Log worker started at sequence {}", sequence);

    while let Some(mut event) = events.blocking_recv() {
        let appended = next_sequence(sequence).and_then(|next| {
            event.sequence = next;
            append(&mut sink, &event, policy, &mut since_sync)
        });

        if let Err(e) = appended {
            tracing::error!(
                "Log append failed after sequence {}: {}. Writer stopped.",
                sequence,
                e
            );
            metrics::gauge!("kvlog_logger_degraded", 1.0);
            let _ = errors.try_send(e);
            return;
        }

        sequence = event.sequence;
        last_sequence.store(sequence, Ordering::SeqCst);
        metrics::counter!("kvlog_events_written_total", 1);
        tracing::trace!("Appended {} {} at sequence {}", event.kind, event.key, sequence);
    }

    // Queue closed: everything submitted has been appended.
    if let Err(e) = sink.sync() {
        tracing::error!("Final log sync failed: {}", e);
        let _ = errors.try_send(e.into());
        return;
    }

    tracing::info!("Log worker drained and synced at sequence {}", sequence);
}

fn append<S: DurableSink>(
    sink: &mut S,
    event: &Event,
    policy: FsyncPolicy,
    since_sync: &mut usize,
) -> Result<()> {
    let line = event.encode().map_err(EventLogError::Encode)?;
    sink.write_all(line.as_bytes())?;
    sink.flush()?;

    *since_sync += 1;
    let should_sync = match policy {
        FsyncPolicy::EveryWrite => true,
        FsyncPolicy::EveryN(n) => *since_sync >= n.max(1),
        FsyncPolicy::OnClose => false,
    };
    if should_sync {
        sink.sync()?;
        *since_sync = 0;
    }
    Ok(())
}

/// Transaction logger persisting to a single append-only text file.
pub struct FileTransactionLogger {
    path: PathBuf,
    config: EventLogConfig,
    /// Write handle, moved into the worker by `run`.
    file: Mutex<Option<File>>,
    events: Mutex<Option<mpsc::Sender<Event>>>,
    errors: Mutex<Option<ErrorReceiver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_sequence: Arc<AtomicU64>,
    replaying: Arc<AtomicBool>,
    started: AtomicBool,
}

impl FileTransactionLogger {
    /// Open or create the log at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, EventLogConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: EventLogConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        tracing::info!("Transaction log opened at {:?}", path);

        Ok(Self {
            path,
            config,
            file: Mutex::new(Some(file)),
            events: Mutex::new(None),
            errors: Mutex::new(None),
            worker: Mutex::new(None),
            last_sequence: Arc::new(AtomicU64::new(0)),
            replaying: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
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

#[async_trait]
impl TransactionLogger for FileTransactionLogger {
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

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                self.replaying.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let last_sequence = Arc::clone(&self.last_sequence);
        let replaying = Arc::clone(&self.replaying);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let result = scan_log(BufReader::new(file), &last_sequence, |event| {
                event_tx.blocking_send(event).is_ok()
            });

            if let Err(e) = result {
                tracing::error!("Replay of {:?} failed: {}", path, e);
                let _ = error_tx.try_send(e);
            }

            // Cleared before the senders drop, so a consumer that saw the
            // stream close may call `run` immediately.
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

        let file = lock(&self.file).take().ok_or(EventLogError::AlreadyRunning)?;

        let (event_tx, event_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(1);
        *lock(&self.events) = Some(event_tx);
        *lock(&self.errors) = Some(error_rx);

        let last_sequence = Arc::clone(&self.last_sequence);
        let policy = self.config.fsync_policy;
        let handle = tokio::task::spawn_blocking(move || {
            persist_events(BufWriter::new(file), event_rx, error_tx, last_sequence, policy)
        });
        *lock(&self.worker) = Some(handle);

        tracing::info!(
            "Transaction log writer running (next sequence {}, queue {})",
            self.last_sequence.load(Ordering::SeqCst) + 1,
            self.config.queue_capacity
        );
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

        tracing::info!(
            "Transaction log closed at sequence {}",
            self.last_sequence.load(Ordering::SeqCst)
        );
        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }
}
