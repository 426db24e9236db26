//! # Merge and Deduplication
//!
//! Reconciles the in-page store with the external channel into one ordered
//! record.
//!
//! ## Algorithm
//!
//! 1. Key each event by `(timestamp, first N message characters)`
//! 2. Insert channel events first (their call sites are richer, especially for
//!    calls made very early in page life)
//! 3. Insert store events; a duplicate key replaces the kept entry only if the
//!    candidate is high-value or has a strictly longer call site. Replacement
//!    keeps the original position.
//! 4. Stable sort by timestamp, so ties keep insertion order (channel first)
//!
//! An empty channel degrades to the store alone, sorted.

use consolecap_common::MESSAGE_KEY_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::priority::{NoPriority, PriorityPredicate};
use crate::domain::Timestamp;
use crate::event_data::DiagnosticEvent;

/// Consolidated, deduplicated, chronologically ordered events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedRecord {
    pub events: Vec<DiagnosticEvent>,
}

impl MergedRecord {
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiagnosticEvent> {
        self.events.iter()
    }
}

impl IntoIterator for MergedRecord {
    type Item = DiagnosticEvent;
    type IntoIter = std::vec::IntoIter<DiagnosticEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

type DedupKey = (Timestamp, String);

/// Deduplication key: timestamp plus the first `prefix` message characters
#[must_use]
pub fn dedup_key(event: &DiagnosticEvent, prefix: usize) -> (Timestamp, String) {
    (event.timestamp, event.message.chars().take(prefix).collect())
}

pub struct Merger {
    prefix: usize,
    priority: Box<dyn PriorityPredicate>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(Box::new(NoPriority))
    }
}

impl Merger {
    #[must_use]
    pub fn new(priority: Box<dyn PriorityPredicate>) -> Self {
        Self { prefix: MESSAGE_KEY_PREFIX, priority }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: usize) -> Self {
        self.prefix = prefix;
        self
    }

    /// Merge store and channel events into one ordered record
    #[must_use]
    pub fn merge(&self, store: &[DiagnosticEvent], channel: &[DiagnosticEvent]) -> MergedRecord {
        let mut kept: Vec<DiagnosticEvent> = Vec::with_capacity(store.len() + channel.len());
        let mut index: HashMap<DedupKey, usize> = HashMap::with_capacity(kept.capacity());

        for candidate in channel.iter().chain(store) {
            let key = dedup_key(candidate, self.prefix);
            match index.get(&key) {
                None => {
                    index.insert(key, kept.len());
                    kept.push(candidate.clone());
                }
                Some(&slot) => {
                    if self.should_replace(&kept[slot], candidate) {
                        kept[slot] = candidate.clone();
                    }
                }
            }
        }

        kept.sort_by_key(|e| e.timestamp);
        MergedRecord { events: kept }
    }

    fn should_replace(&self, existing: &DiagnosticEvent, candidate: &DiagnosticEvent) -> bool {
        self.priority.is_high_value(candidate) || candidate.call_site_len() > existing.call_site_len()
    }
}
