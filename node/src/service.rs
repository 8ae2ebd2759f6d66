// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Key-value service: the store plus its transaction log.
//!
//! # Invariants
//! - No write is accepted before replay has fully completed
//! - Every accepted mutation is applied to the store, then enqueued on the log
//! - Store mutation and enqueue happen under one write lock, so the log order
//!   of writes to a key matches the order they hit the store
//! - After the writer fails or exits before shutdown, all further writes are
//!   refused
//!
//! # Crash window
//! A mutation is visible in the store before its record is durable. A crash
//! in between loses that mutation on restart; the store is authoritative for
//! the running process and the log is authoritative across restarts.

use kvlog_kernel::event::{validate_key, validate_value};
use kvlog_kernel::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::EngineError;
use crate::events::TransactionLogger;
use crate::recovery::{replay_into, ReplaySummary};

pub struct KvService<L: TransactionLogger> {
    store: Store,
    logger: L,
    degraded: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    /// Held across store mutation and enqueue.
    write_order: Mutex<()>,
    replay: ReplaySummary,
}

fn mark_degraded(flag: &AtomicBool) {
    flag.store(true, Ordering::SeqCst);
    metrics::gauge!("kvlog_logger_degraded", 1.0);
}

impl<L: TransactionLogger> KvService<L> {
    /// Replay the log into a fresh store, then start the writer.
    ///
    /// Fails without starting the writer if any replay error occurs.
    pub async fn bootstrap(logger: L) -> Result<Self, EngineError> {
        let store = Store::new();
        let replay = replay_into(&logger, &store).await?;

        logger.run()?;

        let degraded = Arc::new(AtomicBool::new(false));
        let closing = Arc::new(AtomicBool::new(false));
        if let Some(mut errors) = logger.err() {
            let flag = Arc::clone(&degraded);
            let closing = Arc::clone(&closing);
            tokio::spawn(async move {
                match errors.recv().await {
                    Some(err) => {
                        tracing::error!("Transaction log failed, refusing further writes: {}", err);
                        mark_degraded(&flag);
                    }
                    None if closing.load(Ordering::SeqCst) => {}
                    // Worker gone without a report (e.g. it panicked).
                    None => {
                        tracing::error!(
                            "Transaction log writer exited unexpectedly, refusing further writes"
                        );
                        mark_degraded(&flag);
                    }
                }
            });
        }

        Ok(Self {
            store,
            logger,
            degraded,
            closing,
            write_order: Mutex::new(()),
            replay,
        })
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), EngineError> {
        validate_key(key)?;
        validate_value(value)?;
        self.ensure_writable()?;

        let _order = self.write_order.lock().await;
        self.store.put(key, value);
        self.logger.write_put(key, value).await?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<String, EngineError> {
        self.store
            .get(key)
            .map_err(|e| EngineError::from_store(key, e))
    }

    /// Deleting an absent key succeeds and is still logged.
    pub async fn delete(&self, key: &str) -> Result<(), EngineError> {
        validate_key(key)?;
        self.ensure_writable()?;

        let _order = self.write_order.lock().await;
        self.store.delete(key);
        self.logger.write_delete(key).await?;
        Ok(())
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    /// Outcome of the startup replay.
    pub fn replay_summary(&self) -> &ReplaySummary {
        &self.replay
    }

    /// Close the logger, waiting for queued records to be persisted.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        tracing::info!("Shutting down; draining transaction log");
        self.closing.store(true, Ordering::SeqCst);
        self.logger.close().await?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), EngineError> {
        if self.is_degraded() {
            return Err(EngineError::Degraded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::transaction_log::Result as LogResult;
    use crate::events::{ErrorReceiver, EventReceiver, MemoryTransactionLogger};
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_get_delete() {
        let svc = KvService::bootstrap(MemoryTransactionLogger::new()).await.unwrap();

        svc.put("color", "blue").await.unwrap();
        assert_eq!(svc.get("color").unwrap(), "blue");

        svc.delete("color").await.unwrap();
        assert!(matches!(svc.get("color"), Err(EngineError::NotFound(_))));

        svc.shutdown().await.unwrap();
        assert_eq!(svc.logger().records().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_mutation() {
        let svc = KvService::bootstrap(MemoryTransactionLogger::new()).await.unwrap();

        assert!(matches!(svc.put("", "v").await, Err(EngineError::InvalidInput(_))));
        assert!(matches!(svc.put("k", "a\nb").await, Err(EngineError::InvalidInput(_))));
        assert!(matches!(svc.delete("k\t").await, Err(EngineError::InvalidInput(_))));
        assert!(svc.store().is_empty());

        svc.shutdown().await.unwrap();
        assert!(svc.logger().records().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_after_writer_failure() {
        let logger = MemoryTransactionLogger::new().fail_after(1);
        let svc = KvService::bootstrap(logger).await.unwrap();

        svc.put("a", "1").await.unwrap();
        svc.put("b", "2").await.unwrap();

        for _ in 0..100 {
            if svc.is_degraded() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(svc.is_degraded());
        assert!(matches!(svc.put("c", "3").await, Err(EngineError::Degraded)));

        // Reads still served from the store.
        assert_eq!(svc.get("b").unwrap(), "2");
    }

    /// Memory logger whose writer vanishes without reporting an error.
    struct VanishingLogger(MemoryTransactionLogger);

    #[async_trait::async_trait]
    impl TransactionLogger for VanishingLogger {
        async fn write_put(&self, key: &str, value: &str) -> LogResult<()> {
            self.0.write_put(key, value).await
        }

        async fn write_delete(&self, key: &str) -> LogResult<()> {
            self.0.write_delete(key).await
        }

        fn err(&self) -> Option<ErrorReceiver> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Some(rx)
        }

        fn read_events(&self) -> LogResult<(EventReceiver, ErrorReceiver)> {
            self.0.read_events()
        }

        fn run(&self) -> LogResult<()> {
            self.0.run()
        }

        async fn close(&self) -> LogResult<()> {
            self.0.close().await
        }

        fn last_sequence(&self) -> u64 {
            self.0.last_sequence()
        }
    }

    async fn wait_for_degraded<L: TransactionLogger>(svc: &KvService<L>) -> bool {
        for _ in 0..100 {
            if svc.is_degraded() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_writer_exit_without_error_degrades() {
        let svc = KvService::bootstrap(VanishingLogger(MemoryTransactionLogger::new()))
            .await
            .unwrap();

        assert!(wait_for_degraded(&svc).await);
        assert!(matches!(svc.put("a", "1").await, Err(EngineError::Degraded)));
    }

    #[tokio::test]
    async fn test_shutdown_is_not_degraded() {
        let svc = KvService::bootstrap(MemoryTransactionLogger::new()).await.unwrap();
        svc.put("a", "1").await.unwrap();
        svc.shutdown().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!svc.is_degraded());
    }

    #[tokio::test]
    async fn test_exhausted_sequence_degrades() {
        let logger = MemoryTransactionLogger::with_records(vec![
            kvlog_kernel::Event::put("a", "1").with_sequence(u64::MAX),
        ]);
        let svc = KvService::bootstrap(logger).await.unwrap();

        svc.put("b", "2").await.unwrap();
        assert!(wait_for_degraded(&svc).await);
        assert!(matches!(svc.put("c", "3").await, Err(EngineError::Degraded)));
        svc.shutdown().await.unwrap();
        assert_eq!(svc.logger().records().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_fails_on_corrupt_log() {
        let logger = MemoryTransactionLogger::with_records(vec![
            kvlog_kernel::Event::put("a", "1").with_sequence(5),
            kvlog_kernel::Event::put("a", "2").with_sequence(4),
        ]);

        assert!(matches!(
            KvService::bootstrap(logger).await,
            Err(EngineError::Replay(_))
        ));
    }
}
