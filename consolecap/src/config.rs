//! Engine configuration
//!
//! Every tunable defaults to the shared constants in `consolecap-common`. A
//! JSON file may override any subset; CLI flags are applied on top.

use consolecap_common::{
    CALL_SITE_SKIP_FRAMES, MAX_CALL_SITE_FRAMES, MESSAGE_KEY_PREFIX, MUTATION_WINDOW_SECS,
    STORE_CAPACITY, WATCHDOG_DENSE_TICKS, WATCHDOG_MAX_TICKS, WATCHDOG_SPARSE_STRIDE,
    WATCHDOG_TICK_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::capture::WatchdogConfig;
use crate::domain::ConfigError;
use crate::merge::{MarkerTokens, Merger, NoPriority};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store_capacity: usize,
    pub max_call_site_frames: usize,
    pub call_site_skip_frames: usize,
    pub message_key_prefix: usize,
    pub watchdog_tick_ms: u64,
    pub watchdog_dense_ticks: u64,
    pub watchdog_sparse_stride: u64,
    pub watchdog_max_ticks: u64,
    pub mutation_window_secs: u64,
    /// Message tokens that win duplicate resolution (empty = none)
    pub priority_markers: Vec<String>,
    /// Bound of the live event tap; slow consumers lose events beyond it
    pub live_tap_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_capacity: STORE_CAPACITY,
            max_call_site_frames: MAX_CALL_SITE_FRAMES,
            call_site_skip_frames: CALL_SITE_SKIP_FRAMES,
            message_key_prefix: MESSAGE_KEY_PREFIX,
            watchdog_tick_ms: WATCHDOG_TICK_MS,
            watchdog_dense_ticks: WATCHDOG_DENSE_TICKS,
            watchdog_sparse_stride: WATCHDOG_SPARSE_STRIDE,
            watchdog_max_ticks: WATCHDOG_MAX_TICKS,
            mutation_window_secs: MUTATION_WINDOW_SECS,
            priority_markers: Vec::new(),
            live_tap_capacity: 1000,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or fails validation
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_capacity == 0 {
            return Err(ConfigError::Invalid("store_capacity must be at least 1".into()));
        }
        if self.watchdog_tick_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_tick_ms must be at least 1".into()));
        }
        if self.watchdog_sparse_stride == 0 {
            return Err(ConfigError::Invalid("watchdog_sparse_stride must be at least 1".into()));
        }
        if self.watchdog_max_ticks < self.watchdog_dense_ticks {
            return Err(ConfigError::Invalid(format!(
                "watchdog_max_ticks ({}) is below watchdog_dense_ticks ({})",
                self.watchdog_max_ticks, self.watchdog_dense_ticks
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig {
            tick: Duration::from_millis(self.watchdog_tick_ms),
            dense_ticks: self.watchdog_dense_ticks,
            sparse_stride: self.watchdog_sparse_stride,
            max_ticks: self.watchdog_max_ticks,
            mutation_window: Duration::from_secs(self.mutation_window_secs),
        }
    }

    #[must_use]
    pub fn merger(&self) -> Merger {
        let merger = if self.priority_markers.is_empty() {
            Merger::new(Box::new(NoPriority))
        } else {
            Merger::new(Box::new(MarkerTokens::new(self.priority_markers.iter().cloned())))
        };
        merger.with_prefix(self.message_key_prefix)
    }
}
