//! Domain model for consolecap
//!
//! Newtypes keep page contexts, timestamps and engine identities from being
//! mixed up; each failure class of the engine has its own error enum.

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ContextId, EngineId, PageInfo, Timestamp};

pub use errors::{ChannelError, ConfigError, ExportError, InstallError, SubmitError};
