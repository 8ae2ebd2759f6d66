// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Errors surfaced synchronously by the [`Store`](crate::state::Store).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Requested key is absent.
    #[error("no such key")]
    NoSuchKey,
}

/// Errors produced while encoding or decoding a log record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("record is not terminated by a newline")]
    Unterminated,

    #[error("expected 4 tab-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid sequence number {0:?}")]
    InvalidSequence(String),

    #[error("invalid event kind {0:?}")]
    InvalidKind(String),

    #[error("key must not be empty")]
    EmptyKey,

    #[error("{field} contains a reserved character (tab or line break)")]
    ReservedCharacter { field: &'static str },
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;
pub type EventResult<T> = core::result::Result<T, EventError>;
