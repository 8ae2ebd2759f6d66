// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The store is mutated before the log append completes. These tests pin
//! down what a restart sees when the append never lands.

use kvlog_node::errors::EngineError;
use kvlog_node::events::{MemoryTransactionLogger, TransactionLogger};
use kvlog_node::service::KvService;
use std::time::Duration;

async fn wait_degraded(svc: &KvService<MemoryTransactionLogger>) {
    for _ in 0..200 {
        if svc.is_degraded() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("writer failure was never reported");
}

#[tokio::test]
async fn test_unlogged_mutation_lost_on_restart() {
    let logger = MemoryTransactionLogger::new().fail_after(2);
    let records = logger.shared();
    let svc = KvService::bootstrap(logger).await.unwrap();

    svc.put("a", "1").await.unwrap();
    svc.put("b", "2").await.unwrap();
    // Accepted and visible, but the backend refuses the append.
    svc.put("c", "3").await.unwrap();
    assert_eq!(svc.get("c").unwrap(), "3");

    wait_degraded(&svc).await;
    assert!(matches!(svc.put("d", "4").await, Err(EngineError::Degraded)));

    let restarted = KvService::bootstrap(MemoryTransactionLogger::with_shared(records))
        .await
        .unwrap();
    assert_eq!(restarted.get("a").unwrap(), "1");
    assert_eq!(restarted.get("b").unwrap(), "2");
    assert!(matches!(restarted.get("c"), Err(EngineError::NotFound(_))));
    assert_eq!(restarted.logger().last_sequence(), 2);
}

#[tokio::test]
async fn test_unlogged_delete_resurrects_on_restart() {
    let logger = MemoryTransactionLogger::new().fail_after(1);
    let records = logger.shared();
    let svc = KvService::bootstrap(logger).await.unwrap();

    svc.put("a", "1").await.unwrap();
    svc.delete("a").await.unwrap();
    assert!(svc.get("a").is_err());

    wait_degraded(&svc).await;

    let restarted = KvService::bootstrap(MemoryTransactionLogger::with_shared(records))
        .await
        .unwrap();
    assert_eq!(restarted.get("a").unwrap(), "1");
}

#[tokio::test]
async fn test_writes_after_shutdown_rejected() {
    let svc = KvService::bootstrap(MemoryTransactionLogger::new()).await.unwrap();
    svc.put("a", "1").await.unwrap();
    svc.shutdown().await.unwrap();

    // The store accepts the mutation; the closed log refuses it.
    assert!(matches!(svc.put("b", "2").await, Err(EngineError::Log(_))));
    assert_eq!(svc.logger().records().len(), 1);
}
