// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic Hashing and Verification.

use crate::state::Store;

/// Computes the BLAKE3 digest of the store contents.
///
/// Entries are hashed in key order, each as length-prefixed key then
/// length-prefixed value, so `{"ab": "c"}` and `{"a": "bc"}` never collide.
/// Two stores with equal contents always produce equal digests regardless of
/// insertion history.
pub fn store_digest(store: &Store) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();

    let entries = store.entries();
    hasher.update(&(entries.len() as u64).to_le_bytes());

    for (key, value) in &entries {
        hasher.update(&(key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    *hasher.finalize().as_bytes()
}

/// Hex rendering of a digest prefix, for logs.
pub fn short_hex(digest: &[u8; 32]) -> String {
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
