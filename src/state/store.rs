// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory key-value state.
//!
//! The store never writes through to durable storage. Its contents are a
//! projection of the replayed log plus any live mutations applied since.

use crate::error::{StoreError, StoreResult};
use crate::event::{Event, EventKind};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reader-writer guarded map from key to value.
///
/// Reads share the lock; `put` and `delete` take it exclusively.
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never leave the map half-updated, so a poisoned lock
    // still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> StoreResult<String> {
        self.read().get(key).cloned().ok_or(StoreError::NoSuchKey)
    }

    /// Remove `key`. Absent keys are not an error.
    pub fn delete(&self, key: &str) {
        self.write().remove(key);
    }

    /// Apply a replayed event.
    pub fn apply(&self, event: &Event) {
        match event.kind {
            EventKind::Put => self.put(event.key.as_str(), event.value.as_str()),
            EventKind::Delete => self.delete(&event.key),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current contents, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}
