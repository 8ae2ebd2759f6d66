// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kvlog_kernel::{EventError, StoreError};
use serde_json::json;
use thiserror::Error;

use crate::events::EventLogError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no such key: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("replay failed: {0}")]
    Replay(EventLogError),
    #[error("transaction log error: {0}")]
    Log(EventLogError),
    #[error("transaction log unavailable; writes are disabled")]
    Degraded,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::Degraded | EngineError::Log(EventLogError::Stopped) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            EngineError::Replay(_) | EngineError::Log(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<EventError> for EngineError {
    fn from(e: EventError) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

impl From<EventLogError> for EngineError {
    fn from(e: EventLogError) -> Self {
        EngineError::Log(e)
    }
}

impl EngineError {
    pub fn from_store(key: &str, e: StoreError) -> Self {
        match e {
            StoreError::NoSuchKey => EngineError::NotFound(key.to_string()),
        }
    }
}
