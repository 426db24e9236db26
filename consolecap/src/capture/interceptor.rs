//! # Interception of Console Methods
//!
//! Wraps each named diagnostic function so every call is observed, recorded
//! into the event store, and then forwarded to the real function with the
//! original arguments. The host page and anyone watching its console see
//! exactly the same output as without the engine.
//!
//! ## Per-call pipeline
//!
//! 1. Capture the call site (must happen while the wrapper is on the stack)
//! 2. Build a [`DiagnosticEvent`] from the arguments
//! 3. Append to the store (plus the synthetic marker for `clear`)
//! 4. Forward to the real function
//!
//! ## Installation
//!
//! Wrappers carry a [`WrapperTag`] naming the engine that installed them, so
//! reinstallation skips slots that already hold one of ours. Installation
//! tries `define` first and falls back to `assign`; if both are rejected the
//! method stays unobserved until the watchdog's next pass.

use consolecap_common::ConsoleMethod;
use crossbeam_channel::Sender;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};

use super::call_site::CallSiteExtractor;
use super::event_store::SharedStore;
use super::host_console::{DiagnosticFn, HostConsole, WrapperMeta, WrapperTag};
use crate::domain::{EngineId, InstallError, Timestamp};
use crate::event_data::{ArgValue, CallSiteFrame, DiagnosticEvent};

/// Snapshot of interception counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptCounters {
    /// Events appended to the store (markers included)
    pub captured: u64,
    /// Events the live tap dropped because its receiver was slow
    pub tap_dropped: u64,
    /// Wrappers installed via `define`
    pub installed: u64,
    /// Wrappers installed via the `assign` fallback
    pub fallback_installed: u64,
    /// Slots skipped because they already held our wrapper
    pub already_wrapped: u64,
    /// Installation attempts rejected by the host
    pub install_failures: u64,
}

#[derive(Debug, Default)]
struct InterceptStats {
    captured: AtomicU64,
    tap_dropped: AtomicU64,
    installed: AtomicU64,
    fallback_installed: AtomicU64,
    already_wrapped: AtomicU64,
    install_failures: AtomicU64,
}

impl InterceptStats {
    fn snapshot(&self) -> InterceptCounters {
        InterceptCounters {
            captured: self.captured.load(Ordering::Relaxed),
            tap_dropped: self.tap_dropped.load(Ordering::Relaxed),
            installed: self.installed.load(Ordering::Relaxed),
            fallback_installed: self.fallback_installed.load(Ordering::Relaxed),
            already_wrapped: self.already_wrapped.load(Ordering::Relaxed),
            install_failures: self.install_failures.load(Ordering::Relaxed),
        }
    }
}

/// Records intercepted calls into the store
struct Recorder {
    store: SharedStore,
    extractor: CallSiteExtractor,
    origin: String,
    tap: Option<Sender<DiagnosticEvent>>,
    /// Cleared when the owning context ends; stale wrappers then only forward
    active: Arc<AtomicBool>,
    stats: Arc<InterceptStats>,
}

impl Recorder {
    fn record(&self, event: DiagnosticEvent) {
        if let Some(ref tx) = self.tap {
            // Non-blocking send (drop if the consumer is slow)
            if tx.try_send(event.clone()).is_err() {
                self.stats.tap_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.store.lock().unwrap_or_else(PoisonError::into_inner).append(event);
        self.stats.captured.fetch_add(1, Ordering::Relaxed);
    }

    fn observe(&self, method: ConsoleMethod, args: &[ArgValue], call_site: Vec<CallSiteFrame>) {
        let now = Timestamp::now();
        let event = DiagnosticEvent::from_args(method.level(), args, now, self.origin.as_str())
            .with_call_site(call_site.clone());
        self.record(event);

        if method == ConsoleMethod::Clear {
            self.record(DiagnosticEvent::clear_marker(now, self.origin.as_str()).with_call_site(call_site));
        }
    }
}

/// Result of installing one wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Installed via `define`
    Installed,
    /// `define` was rejected, installed via `assign`
    Assigned,
    /// Slot already held one of our wrappers
    AlreadyWrapped,
}

/// Summary of one installation pass over every method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: usize,
    pub assigned: usize,
    pub already_wrapped: usize,
    pub failed: usize,
}

impl InstallReport {
    /// Number of methods observed after this pass
    #[must_use]
    pub fn observed(&self) -> usize {
        self.installed + self.assigned + self.already_wrapped
    }
}

/// Installs and re-asserts wrappers on one host console
pub struct Interceptor {
    engine: EngineId,
    console: Arc<HostConsole>,
    recorder: Arc<Recorder>,
    stats: Arc<InterceptStats>,
}

impl Interceptor {
    /// Create an interceptor that records into `store`
    #[must_use]
    pub fn new(
        console: Arc<HostConsole>,
        store: SharedStore,
        extractor: CallSiteExtractor,
        origin: impl Into<String>,
        tap: Option<Sender<DiagnosticEvent>>,
    ) -> Self {
        let stats = Arc::new(InterceptStats::default());
        let recorder = Arc::new(Recorder {
            store,
            extractor,
            origin: origin.into(),
            tap,
            active: Arc::new(AtomicBool::new(true)),
            stats: Arc::clone(&stats),
        });
        Self { engine: EngineId::next(), console, recorder, stats }
    }

    #[must_use]
    pub fn engine_id(&self) -> EngineId {
        self.engine
    }

    #[must_use]
    pub fn console(&self) -> &Arc<HostConsole> {
        &self.console
    }

    #[must_use]
    pub fn counters(&self) -> InterceptCounters {
        self.stats.snapshot()
    }

    /// Whether `method`'s slot currently holds one of our wrappers
    #[must_use]
    pub fn is_wrapped(&self, method: ConsoleMethod) -> bool {
        self.console.tag_of(method.name()).is_some_and(|tag| tag.engine == self.engine)
    }

    /// Stop recording; installed wrappers keep forwarding to the real functions
    pub fn deactivate(&self) {
        self.recorder.active.store(false, Ordering::Relaxed);
    }

    /// Install a wrapper for `method` around `real`.
    ///
    /// With `real = None` the wrapper forwards to whatever non-wrapper function
    /// occupies the slot at call time.
    ///
    /// # Errors
    /// Returns the `assign` rejection if both installation paths were refused
    pub fn install_wrapper(
        &self,
        method: ConsoleMethod,
        real: Option<DiagnosticFn>,
    ) -> Result<InstallOutcome, InstallError> {
        let name = method.name();
        if self.is_wrapped(method) {
            self.stats.already_wrapped.fetch_add(1, Ordering::Relaxed);
            return Ok(InstallOutcome::AlreadyWrapped);
        }

        let tag = WrapperTag { engine: self.engine, method };
        let meta = WrapperMeta { tag, target: real.clone(), active: Arc::clone(&self.recorder.active) };
        let wrapper = self.build_wrapper(method, real, tag);

        match self.console.define(name, Arc::clone(&wrapper), meta.clone()) {
            Ok(()) => {
                self.stats.installed.fetch_add(1, Ordering::Relaxed);
                debug!("Installed wrapper for console.{name} ({})", self.engine);
                Ok(InstallOutcome::Installed)
            }
            Err(define_err) => {
                debug!("{define_err}, falling back to assignment");
                match self.console.assign(name, wrapper, meta) {
                    Ok(()) => {
                        self.stats.fallback_installed.fetch_add(1, Ordering::Relaxed);
                        Ok(InstallOutcome::Assigned)
                    }
                    Err(assign_err) => {
                        self.stats.install_failures.fetch_add(1, Ordering::Relaxed);
                        Err(assign_err)
                    }
                }
            }
        }
    }

    /// Run one installation pass over every intercepted method.
    ///
    /// The function currently in each slot becomes the wrapper's forwarding
    /// target, so a method the host reassigned since the last pass keeps the
    /// host's new behavior. A retired engine's wrapper is bypassed.
    pub fn install_all(&self) -> InstallReport {
        let mut report = InstallReport::default();
        for method in ConsoleMethod::ALL {
            let real = self.console.forwarding_target(method.name());
            match self.install_wrapper(method, real) {
                Ok(InstallOutcome::Installed) => report.installed += 1,
                Ok(InstallOutcome::Assigned) => report.assigned += 1,
                Ok(InstallOutcome::AlreadyWrapped) => report.already_wrapped += 1,
                Err(e) => {
                    warn!("console.{} left unobserved this cycle: {e}", method.name());
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn build_wrapper(
        &self,
        method: ConsoleMethod,
        real: Option<DiagnosticFn>,
        tag: WrapperTag,
    ) -> DiagnosticFn {
        let recorder = Arc::clone(&self.recorder);
        let console: Weak<HostConsole> = Arc::downgrade(&self.console);

        Arc::new(move |args: &[ArgValue]| {
            if recorder.active.load(Ordering::Relaxed) {
                let call_site = recorder.extractor.capture();
                recorder.observe(method, args, call_site);
            }

            if let Some(ref real) = real {
                real(args);
            } else if let Some(console) = console.upgrade() {
                // Never forward into ourselves
                if console.tag_of(method.name()) != Some(tag) {
                    console.call(method.name(), args);
                }
            }
        })
    }
}
