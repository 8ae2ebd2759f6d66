// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod recovery;
pub mod server;
pub mod service;
pub mod telemetry;
