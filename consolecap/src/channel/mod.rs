//! Out-of-band observation through the privileged inspection channel
//!
//! - `protocol`: console notification types and their conversion to events
//! - `inspector`: backend trait plus the buffered in-process backend
//! - `adapter`: idempotent attach/events/detach with failures swallowed
//! - `replay`: offline conversion of a recorded protocol log

pub mod adapter;
pub mod inspector;
pub mod protocol;
pub mod replay;

pub use adapter::ExternalChannelAdapter;
pub use inspector::{BufferedInspector, InspectionBackend};
pub use protocol::{ConsoleApiCalled, ProtocolMessage, RemoteObject, CONSOLE_API_CALLED};
pub use replay::{replay_log, ReplayedLog};
