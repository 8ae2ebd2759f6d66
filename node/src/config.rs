// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::events::{EventLogConfig, FsyncPolicy};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub log_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub log: EventLogConfig,
    /// Bearer token required on every route when set.
    pub auth_token: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("transaction.log"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log: EventLogConfig::default(),
            auth_token: None,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `KVLOG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(path) = lookup("KVLOG_LOG_PATH") {
            cfg.log_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup("KVLOG_BIND_ADDR") {
            cfg.bind_addr = addr.parse().map_err(|e: std::net::AddrParseError| ConfigError {
                var: "KVLOG_BIND_ADDR",
                value: addr.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(capacity) = lookup("KVLOG_QUEUE_CAPACITY") {
            cfg.log.queue_capacity = match capacity.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError {
                        var: "KVLOG_QUEUE_CAPACITY",
                        value: capacity,
                        reason: "expected a positive integer".into(),
                    })
                }
            };
        }

        if let Some(fsync) = lookup("KVLOG_FSYNC") {
            cfg.log.fsync_policy = parse_fsync(&fsync).ok_or_else(|| ConfigError {
                var: "KVLOG_FSYNC",
                value: fsync.clone(),
                reason: "expected always, never or a positive integer".into(),
            })?;
        }

        cfg.auth_token = lookup("KVLOG_AUTH_TOKEN").filter(|t| !t.is_empty());

        Ok(cfg)
    }
}

fn parse_fsync(raw: &str) -> Option<FsyncPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "always" => Some(FsyncPolicy::EveryWrite),
        "never" => Some(FsyncPolicy::OnClose),
        n => match n.parse::<usize>() {
            Ok(0) | Err(_) => None,
            Ok(1) => Some(FsyncPolicy::EveryWrite),
            Ok(n) => Some(FsyncPolicy::EveryN(n)),
        },
    }
}
