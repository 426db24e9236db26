//! In-page capture pipeline
//!
//! - `host_console`: model of the host-owned, mutable diagnostic object
//! - `event_store`: bounded FIFO of captured events per page context
//! - `call_site`: bounded call-site extraction at interception time
//! - `interceptor`: wrapper installation and per-call recording
//! - `watchdog`: timer + mutation driven re-assertion of the wrappers

pub mod call_site;
pub mod event_store;
pub mod host_console;
pub mod interceptor;
pub mod watchdog;

// Re-export common types
pub use call_site::{CallSiteExtractor, NativeStack, RawFrame, StackSource, StaticStack};
pub use event_store::{snapshot_shared, EventStore, SharedStore};
pub use host_console::{DiagnosticFn, HostConsole, WrapperMeta, WrapperTag};
pub use interceptor::{InstallOutcome, InstallReport, InterceptCounters, Interceptor};
pub use watchdog::{
    mutation_channel, MutationBurst, MutationFeed, TickAction, Watchdog, WatchdogConfig,
    WatchdogCounters, WatchdogPhase,
};
