//! # consolecap - Resilient Console Capture for Hostile Pages
//!
//! consolecap observes every diagnostic call a page makes to its console,
//! even when the page replaces or reassigns that console after the engine's
//! own setup has run, and consolidates the result with an optional privileged
//! inspection channel into one deduplicated, chronologically ordered record
//! suitable for attaching to a bug report.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Host Page                              │
//! │          owns the console, may replace it at any time           │
//! └──────────┬──────────────────────────────────────┬───────────────┘
//!            │ console.log/info/warn/error/debug/clear
//!            ▼                                      │ protocol notifications
//! ┌─────────────────────────┐                       ▼
//! │      Interceptor        │◀─┐         ┌─────────────────────────┐
//! │ wrap, record, forward   │  │         │  Inspection channel     │
//! └──────────┬──────────────┘  │         │  (attach/events/detach) │
//!            │                 │         └────────────┬────────────┘
//!            ▼                 │                      │
//! ┌─────────────────────────┐  │ re-assert            │
//! │   Event Store (FIFO)    │  │                      │
//! └──────────┬──────────────┘  │                      │
//!            │          ┌──────┴─────────┐            │
//!            │          │   Watchdog     │            │
//!            │          │ timer+mutation │            │
//!            │          └────────────────┘            │
//!            ▼                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         Merger: dedup by (timestamp, message prefix)            │
//! │                 then stable sort by timestamp                   │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             ▼
//!                 CaptureReport ──▶ BugReport ──▶ ReportSink
//! ```
//!
//! ## Module Structure
//!
//! ### Core Pipeline Modules
//!
//! - [`capture`]: in-page interception
//!   - `host_console`: the mutable, host-owned console being observed
//!   - `interceptor`: wrapper installation (define, then assign fallback)
//!   - `watchdog`: dense then sparse periodic re-assertion, plus a bounded
//!     mutation-triggered pass
//!   - `event_store`: bounded FIFO (500 events by default)
//!
//! - [`channel`]: the privileged, out-of-band view of the same calls
//!   - `protocol`: DevTools-style `Runtime.consoleAPICalled` messages
//!   - `inspector`: backend trait and the buffered in-process backend
//!   - `adapter`: idempotent attach/detach, failures swallowed
//!
//! - [`merge`]: deduplication, priority tie-breaks and ordering
//!
//! - [`engine`]: per-context sessions tying the pipeline together
//!
//! ### Output and Support Modules
//!
//! - [`export`]: record JSON export and bug report assembly
//! - [`display`]: headless console output
//! - [`demo`]: scripted hostile page for end-to-end runs
//! - [`cli`]: command-line argument parsing
//! - [`config`]: tunables with JSON overrides
//! - [`domain`]: newtypes and error enums
//! - [`event_data`]: `DiagnosticEvent`, call-site frames and the argument model
//!
//! ## Typical Usage
//!
//! ```bash
//! # Watch the engine survive a console hijack
//! consolecap demo --hostile --channel
//!
//! # Consolidate a saved store snapshot with a recorded protocol log
//! consolecap merge --store store.json --channel devtools.jsonl --export merged.json
//! ```
//!
//! ## Key Concepts
//!
//! - **Wrapper**: replacement console method that records, then forwards
//! - **Re-assertion**: unconditional, idempotent reinstallation of wrappers
//! - **Clear marker**: synthetic event recorded in place of a console clear
//! - **Dedup key**: timestamp plus the first 100 message characters

// Expose modules for testing
pub mod capture;
pub mod channel;
pub mod cli;
pub mod config;
pub mod demo;
pub mod display;
pub mod domain;
pub mod engine;
pub mod event_data;
pub mod export;
pub mod merge;
