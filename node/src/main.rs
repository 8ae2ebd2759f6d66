// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use kvlog_node::config::NodeConfig;
use kvlog_node::events::FileTransactionLogger;
use kvlog_node::server::build_router;
use kvlog_node::service::KvService;
use kvlog_node::telemetry::init_telemetry;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    init_telemetry();

    let cfg = match NodeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Initializing kvlog node: log {:?}, bind {}, {:?}, auth {}",
        cfg.log_path,
        cfg.bind_addr,
        cfg.log,
        if cfg.auth_token.is_some() { "on" } else { "off" }
    );

    let logger = match FileTransactionLogger::open_with(&cfg.log_path, cfg.log.clone()) {
        Ok(logger) => logger,
        Err(e) => {
            tracing::error!("Failed to open transaction log {:?}: {}", cfg.log_path, e);
            return ExitCode::FAILURE;
        }
    };

    // Replay must complete before the listener accepts any write.
    let service = match KvService::bootstrap(logger).await {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to replay transaction log: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = build_router(Arc::clone(&service), cfg.auth_token.clone());

    let listener = match TcpListener::bind(cfg.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", cfg.bind_addr, e);
            let _ = service.shutdown().await;
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on {}", cfg.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let closed = service.shutdown().await;

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = closed {
        tracing::error!("Failed to close transaction log: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
