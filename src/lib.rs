// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! kvlog-kernel: the event model, text codec and in-memory store behind a
//! log-structured key-value service.
//!
//! The kernel has no runtime and no I/O. Durability lives in `kvlog-node`,
//! which persists [`event::Event`]s and replays them into a [`state::Store`].

pub mod error;
pub mod event;
pub mod state;
pub mod replay;
pub mod verify;

pub use error::{EventError, StoreError};
pub use event::{Event, EventKind};
pub use state::Store;
