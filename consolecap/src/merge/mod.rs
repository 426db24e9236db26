//! Consolidation of the store and the external channel
//!
//! - `merger`: keyed deduplication and chronological ordering
//! - `priority`: pluggable high-value predicates used as a tie-break

pub mod merger;
pub mod priority;

pub use merger::{dedup_key, MergedRecord, Merger};
pub use priority::{MarkerTokens, NoPriority, PriorityPredicate};
