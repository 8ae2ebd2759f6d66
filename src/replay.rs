// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic replay of events into a store.
//!
//! Replay is a pure fold: same events in the same order => same final store.
//! Sequence validation happens where events are read, not here.

use crate::event::Event;
use crate::state::Store;

/// Apply `events` in order to `store`. Returns how many were applied.
pub fn apply_events<'a, I>(store: &Store, events: I) -> u64
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut applied = 0;
    for event in events {
        store.apply(event);
        applied += 1;
    }
    applied
}

/// Replay `events` into a fresh store.
pub fn replay_events<'a, I>(events: I) -> Store
where
    I: IntoIterator<Item = &'a Event>,
{
    let store = Store::new();
    apply_events(&store, events);
    store
}
