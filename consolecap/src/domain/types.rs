//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a raw millisecond
//! count where a context identifier is expected, and make function signatures
//! more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Execution context identifier
///
/// Opaque identifier of one page lifetime (tab + document). All capture state
/// is scoped to a context and discarded when the context ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CTX:{}", self.0)
    }
}

/// Capture-time instant in milliseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Timestamp(millis)
    }

    /// Build from a fractional millisecond value (protocol timestamps)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_millis_f64(millis: f64) -> Self {
        if millis.is_finite() && millis > 0.0 {
            Timestamp(millis.floor() as u64)
        } else {
            Timestamp(0)
        }
    }

    /// Convert to seconds (f64)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}

/// Identity of one engine instance
///
/// Stamped onto every wrapper the engine installs so reinstallation can tell
/// "already wrapped by us" apart from host-owned functions and from wrappers
/// left behind by a previous engine on the same console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(pub u64);

impl EngineId {
    /// Allocate a process-unique engine id
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EngineId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Page metadata attached to a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub context: ContextId,
    /// Page location active when events are captured
    pub url: String,
    pub title: String,
}

impl PageInfo {
    #[must_use]
    pub fn new(context: ContextId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self { context, url: url.into(), title: title.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_id_display() {
        assert_eq!(ContextId(7).to_string(), "CTX:7");
    }

    #[test]
    fn test_timestamp_from_protocol_millis() {
        assert_eq!(Timestamp::from_millis_f64(1_700_000_000_123.9), Timestamp(1_700_000_000_123));
        assert_eq!(Timestamp::from_millis_f64(f64::NAN), Timestamp(0));
        assert_eq!(Timestamp::from_millis_f64(-5.0), Timestamp(0));
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Timestamp(1_500).to_string(), "1.500s");
    }

    #[test]
    fn test_engine_ids_unique() {
        let a = EngineId::next();
        let b = EngineId::next();
        assert_ne!(a, b);
    }
}
