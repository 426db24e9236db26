//! # Shared Vocabulary (Engine ↔ Inspection Channel)
//!
//! Defines the severity tags, intercepted method names, and numeric defaults
//! shared between the in-page capture engine and anything that speaks to it
//! from outside (inspection backends, report consumers, tooling).
//!
//! ## Key Types
//!
//! - [`Level`] - Severity/category tag carried by every captured event
//! - [`ConsoleMethod`] - The fixed set of diagnostic functions that get wrapped
//!
//! Everything here is `no_std` so it can be reused by embedders that only need
//! the wire vocabulary.

#![cfg_attr(not(test), no_std)]

// ============================================================================
// Capacity Constants
// ============================================================================

/// Maximum number of events held by one page context's event store.
///
/// Appending beyond this evicts the oldest entry (FIFO).
pub const STORE_CAPACITY: usize = 500;

/// Maximum number of call-site frames recorded per event
pub const MAX_CALL_SITE_FRAMES: usize = 10;

/// Frames skipped above the caller once extractor frames are gone
/// (the wrapper and the console dispatch that invoked it)
pub const CALL_SITE_SKIP_FRAMES: usize = 2;

/// Number of message characters that participate in the deduplication key
pub const MESSAGE_KEY_PREFIX: usize = 100;

/// Placeholder used when a frame has no function name
pub const ANONYMOUS_FUNCTION: &str = "<anonymous>";

/// Message text of the synthetic event recorded when the console is cleared
pub const CLEAR_MARKER_MESSAGE: &str = "Console was cleared";

// ============================================================================
// Watchdog Cadence
// ============================================================================

/// Interval between watchdog ticks, in milliseconds
pub const WATCHDOG_TICK_MS: u64 = 200;

/// Number of ticks in the dense phase (reinstall on every tick)
pub const WATCHDOG_DENSE_TICKS: u64 = 150;

/// After the dense phase, reinstall only on every k-th tick
pub const WATCHDOG_SPARSE_STRIDE: u64 = 5;

/// Hard ceiling after which the watchdog stops unconditionally
pub const WATCHDOG_MAX_TICKS: u64 = 3000;

/// How long structural mutations keep triggering reinstallation, in seconds
pub const MUTATION_WINDOW_SECS: u64 = 60;

// ============================================================================
// Shared Enums
// ============================================================================

/// Severity/category tag of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Level {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl Level {
    /// Lowercase name as used by the host console
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }
}

impl core::fmt::Display for Level {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic function on the host console that the engine wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleMethod {
    Log,
    Info,
    Warn,
    Error,
    Debug,
    /// Destructive: wiped output is recorded as a synthetic marker event
    Clear,
}

impl ConsoleMethod {
    /// Every method the engine intercepts, in installation order
    pub const ALL: [ConsoleMethod; 6] = [
        ConsoleMethod::Log,
        ConsoleMethod::Info,
        ConsoleMethod::Warn,
        ConsoleMethod::Error,
        ConsoleMethod::Debug,
        ConsoleMethod::Clear,
    ];

    /// Slot name on the host console
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ConsoleMethod::Log => "log",
            ConsoleMethod::Info => "info",
            ConsoleMethod::Warn => "warn",
            ConsoleMethod::Error => "error",
            ConsoleMethod::Debug => "debug",
            ConsoleMethod::Clear => "clear",
        }
    }

    /// Level recorded for calls through this method.
    ///
    /// `Clear` records its marker as informational.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            ConsoleMethod::Log => Level::Log,
            ConsoleMethod::Info | ConsoleMethod::Clear => Level::Info,
            ConsoleMethod::Warn => Level::Warn,
            ConsoleMethod::Error => Level::Error,
            ConsoleMethod::Debug => Level::Debug,
        }
    }

    /// Look up a method by its slot name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ConsoleMethod::ALL.into_iter().find(|m| m.name() == name)
    }
}
