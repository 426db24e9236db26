//! Bounded event store for one page context
//!
//! Fixed-capacity FIFO: a full store never rejects an append, it silently
//! evicts the oldest entry. Snapshots are owned copies, so later appends are
//! never observed through a snapshot.

use consolecap_common::STORE_CAPACITY;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::event_data::DiagnosticEvent;

/// Store handle shared between the wrappers (writers) and the engine (reader)
pub type SharedStore = Arc<Mutex<EventStore>>;

#[derive(Debug)]
pub struct EventStore {
    events: VecDeque<DiagnosticEvent>,
    capacity: usize,
    /// Total entries evicted since creation (diagnostics only)
    evicted: u64,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::with_capacity(STORE_CAPACITY)
    }
}

impl EventStore {
    /// Create a store holding at most `capacity` events (minimum 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity), capacity, evicted: 0 }
    }

    /// Wrap a fresh store for sharing with wrappers
    #[must_use]
    pub fn shared(capacity: usize) -> SharedStore {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    /// Append an event, evicting the oldest entry when over capacity
    pub fn append(&mut self, event: DiagnosticEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
    }

    /// Owned copy of the current contents, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<DiagnosticEvent> {
        self.events.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Snapshot a shared store, tolerating a poisoned lock
#[must_use]
pub fn snapshot_shared(store: &SharedStore) -> Vec<DiagnosticEvent> {
    store.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
}
