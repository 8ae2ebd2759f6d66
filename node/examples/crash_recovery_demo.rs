// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Simple Crash Recovery Demo
//!
//! Writes through the service, drops it, and rebuilds the store from the
//! transaction log alone.

use kvlog_kernel::verify::{short_hex, store_digest};
use kvlog_node::events::FileTransactionLogger;
use kvlog_node::service::KvService;
use tempfile::tempdir;

#[tokio::main]
async fn main() {
    println!("\n╔════════════════════════════════════════╗");
    println!("║  kvlog Crash Recovery Demo            ║");
    println!("╚════════════════════════════════════════╝\n");

    let dir = tempdir().unwrap();
    let log_path = dir.path().join("demo.log");

    // Phase 1: Write
    println!("📝 Phase 1: 100 puts + 20 deletes");
    let svc = KvService::bootstrap(FileTransactionLogger::open(&log_path).unwrap())
        .await
        .unwrap();
    for i in 0..100 {
        svc.put(&format!("user:{}", i), &format!("name-{}", i)).await.unwrap();
    }
    for i in (0..100).step_by(5) {
        svc.delete(&format!("user:{}", i)).await.unwrap();
    }

    let pre_crash = store_digest(svc.store());
    println!("   ✅ {} keys live", svc.store().len());
    println!("   📊 Store digest: {}\n", short_hex(&pre_crash));

    // Phase 2: Stop. The queue drains, the in-memory store is gone.
    println!("💥 Phase 2: process stops");
    svc.shutdown().await.unwrap();
    drop(svc);
    println!("   💔 Memory lost, only the log on disk\n");

    // Phase 3: Recovery
    println!("🔧 Phase 3: RECOVERY (log replay)");
    let recovered = KvService::bootstrap(FileTransactionLogger::open(&log_path).unwrap())
        .await
        .unwrap();
    let summary = recovered.replay_summary();
    println!(
        "   ✅ replayed {} events up to sequence {}",
        summary.events, summary.last_sequence
    );

    // Phase 4: Validate
    println!("\n✨ Phase 4: VALIDATION");
    println!("   Pre-crash : {}", short_hex(&pre_crash));
    println!("   Recovered : {}", short_hex(&summary.digest));

    if pre_crash == summary.digest {
        println!("\n   ✅ Digests match");
    } else {
        println!("\n   ❌ FAILURE: digests differ");
        std::process::exit(1);
    }

    recovered.shutdown().await.unwrap();
}
