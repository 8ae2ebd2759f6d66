// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct PutResponse {
    pub key: String,
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeleteResponse {
    pub key: String,
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    /// `ok`, or `degraded` once the log writer has failed.
    pub status: String,
    pub last_sequence: u64,
    pub keys: usize,
}
