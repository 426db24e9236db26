//! # Capture Engine
//!
//! Owns one [`CaptureSession`] per page context. All capture state is scoped
//! to a [`ContextId`]: created on activation, torn down on context end, never
//! shared between contexts and never persisted.
//!
//! ## Flow
//!
//! ```text
//! activate ──▶ install wrappers ──▶ watchdog (timer + mutations)
//!                    │
//!   console calls ──▶ event store ──┐
//!                                   ├──▶ merge ──▶ CaptureReport
//!   inspection channel (optional) ──┘
//! ```

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::capture::{
    snapshot_shared, CallSiteExtractor, EventStore, HostConsole, InstallReport, InterceptCounters,
    Interceptor, MutationBurst, NativeStack, SharedStore, StackSource, Watchdog, WatchdogCounters,
};
use crate::channel::{ExternalChannelAdapter, InspectionBackend};
use crate::config::EngineConfig;
use crate::domain::{ContextId, PageInfo};
use crate::event_data::DiagnosticEvent;
use crate::merge::{MergedRecord, Merger};

/// Result of a capture request: the merged record plus page metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub origin: String,
    pub title: String,
    pub record: MergedRecord,
}

/// Per-context diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub stored: usize,
    pub evicted: u64,
    pub channel_enabled: bool,
    pub intercept: InterceptCounters,
    pub watchdog: WatchdogCounters,
}

/// Capture state for one page context
struct CaptureSession {
    page: PageInfo,
    store: SharedStore,
    interceptor: Arc<Interceptor>,
    watchdog: Watchdog,
    channel_enabled: bool,
}

pub struct CaptureEngine<B> {
    config: EngineConfig,
    sessions: HashMap<ContextId, CaptureSession>,
    channel: ExternalChannelAdapter<B>,
    merger: Merger,
    stack_source: Arc<dyn StackSource>,
    tap: Option<Sender<DiagnosticEvent>>,
}

impl<B: InspectionBackend> CaptureEngine<B> {
    #[must_use]
    pub fn new(config: EngineConfig, backend: Arc<B>) -> Self {
        let merger = config.merger();
        Self {
            config,
            sessions: HashMap::new(),
            channel: ExternalChannelAdapter::new(backend),
            merger,
            stack_source: Arc::new(NativeStack),
            tap: None,
        }
    }

    /// Use a different stack source for call-site capture
    #[must_use]
    pub fn with_stack_source(mut self, source: Arc<dyn StackSource>) -> Self {
        self.stack_source = source;
        self
    }

    /// Replace the merge policy
    #[must_use]
    pub fn with_merger(mut self, merger: Merger) -> Self {
        self.merger = merger;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn channel(&self) -> &ExternalChannelAdapter<B> {
        &self.channel
    }

    /// Stream of every event captured by contexts activated after this call.
    ///
    /// Bounded; events are dropped rather than blocking the page when the
    /// receiver falls behind.
    pub fn live_tap(&mut self) -> Receiver<DiagnosticEvent> {
        let (tx, rx) = bounded(self.config.live_tap_capacity.max(1));
        self.tap = Some(tx);
        rx
    }

    /// Start capturing for `page` on `console`.
    ///
    /// Installs the wrappers once immediately and starts the watchdog. An
    /// existing session for the same context is ended first.
    pub async fn activate(
        &mut self,
        page: PageInfo,
        console: Arc<HostConsole>,
        mutations: Option<mpsc::UnboundedReceiver<MutationBurst>>,
    ) -> InstallReport {
        let context = page.context;
        if self.sessions.contains_key(&context) {
            debug!("Re-activating {context}, ending previous session");
            self.end_context(context).await;
        }

        let store = EventStore::shared(self.config.store_capacity);
        let extractor = CallSiteExtractor::new(Arc::clone(&self.stack_source))
            .with_limits(self.config.call_site_skip_frames, self.config.max_call_site_frames);
        let interceptor = Arc::new(Interceptor::new(
            console,
            Arc::clone(&store),
            extractor,
            page.url.clone(),
            self.tap.clone(),
        ));

        let report = interceptor.install_all();
        let watchdog = Watchdog::spawn(Arc::clone(&interceptor), self.config.watchdog(), mutations);
        info!(
            "Activated {context} ({}): {}/{} methods observed",
            page.url,
            report.observed(),
            report.observed() + report.failed
        );

        self.sessions.insert(
            context,
            CaptureSession { page, store, interceptor, watchdog, channel_enabled: false },
        );
        report
    }

    /// Attach the inspection channel for an active context
    pub async fn enable_channel(&mut self, context: ContextId) -> bool {
        let Some(session) = self.sessions.get_mut(&context) else {
            debug!("Cannot enable channel for inactive {context}");
            return false;
        };
        session.channel_enabled = self.channel.attach(context).await;
        session.channel_enabled
    }

    /// Detach the inspection channel; the context keeps capturing in-page
    pub async fn disable_channel(&mut self, context: ContextId) {
        if let Some(session) = self.sessions.get_mut(&context) {
            session.channel_enabled = false;
        }
        self.channel.detach(context).await;
    }

    /// Current store contents, without touching the inspection channel
    #[must_use]
    pub fn peek(&self, context: ContextId) -> Vec<DiagnosticEvent> {
        self.sessions.get(&context).map(|s| snapshot_shared(&s.store)).unwrap_or_default()
    }

    /// Merge the store with the channel (when enabled) into one record.
    ///
    /// An unknown context yields an empty report.
    pub async fn capture(&self, context: ContextId) -> CaptureReport {
        let Some(session) = self.sessions.get(&context) else {
            debug!("Capture requested for inactive {context}, returning empty record");
            return CaptureReport::default();
        };

        // Snapshot first: the record reflects the store at request time
        let store_events = snapshot_shared(&session.store);
        let channel_events = if session.channel_enabled {
            self.channel.events(context).await
        } else {
            Vec::new()
        };

        let record = self.merger.merge(&store_events, &channel_events);
        debug!(
            "Captured {context}: {} store + {} channel -> {} merged",
            store_events.len(),
            channel_events.len(),
            record.len()
        );
        CaptureReport { origin: session.page.url.clone(), title: session.page.title.clone(), record }
    }

    /// Tear down everything belonging to `context`.
    ///
    /// Returns `false` if the context was not active.
    pub async fn end_context(&mut self, context: ContextId) -> bool {
        let Some(session) = self.sessions.remove(&context) else {
            self.channel.detach(context).await;
            return false;
        };

        session.interceptor.deactivate();
        session.watchdog.shutdown().await;
        // Unconditional: the host may have attached on our behalf
        self.channel.detach(context).await;
        info!("Ended {context} ({})", session.page.url);
        true
    }

    /// End every active context
    pub async fn shutdown(&mut self) {
        let contexts: Vec<ContextId> = self.sessions.keys().copied().collect();
        for context in contexts {
            self.end_context(context).await;
        }
    }

    #[must_use]
    pub fn is_active(&self, context: ContextId) -> bool {
        self.sessions.contains_key(&context)
    }

    #[must_use]
    pub fn stats(&self, context: ContextId) -> Option<SessionStats> {
        self.sessions.get(&context).map(|s| {
            let store = s.store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            SessionStats {
                stored: store.len(),
                evicted: store.evicted(),
                channel_enabled: s.channel_enabled,
                intercept: s.interceptor.counters(),
                watchdog: s.watchdog.counters(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StaticStack;
    use crate::channel::BufferedInspector;
    use crate::event_data::ArgValue;

    fn engine() -> CaptureEngine<BufferedInspector> {
        CaptureEngine::new(EngineConfig::default(), Arc::new(BufferedInspector::default()))
            .with_stack_source(Arc::new(StaticStack::default()))
    }

    fn page(id: u64) -> PageInfo {
        PageInfo::new(ContextId(id), format!("https://app.test/{id}"), "App")
    }

    #[tokio::test(start_paused = true)]
    async fn test_contexts_are_isolated() {
        let mut engine = engine();
        let first = Arc::new(HostConsole::with_handler(|_, _| {}));
        let second = Arc::new(HostConsole::with_handler(|_, _| {}));
        engine.activate(page(1), Arc::clone(&first), None).await;
        engine.activate(page(2), Arc::clone(&second), None).await;

        first.call("log", &[ArgValue::from("one")]);
        second.call("log", &[ArgValue::from("two")]);
        second.call("log", &[ArgValue::from("three")]);

        assert_eq!(engine.peek(ContextId(1)).len(), 1);
        assert_eq!(engine.peek(ContextId(2)).len(), 2);
        assert_eq!(engine.peek(ContextId(2))[0].origin, "https://app.test/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_context_discards_state() {
        let mut engine = engine();
        let console = Arc::new(HostConsole::with_handler(|_, _| {}));
        engine.activate(page(1), Arc::clone(&console), None).await;
        console.call("warn", &[ArgValue::from("x")]);

        assert!(engine.end_context(ContextId(1)).await);
        assert!(!engine.is_active(ContextId(1)));
        assert!(engine.peek(ContextId(1)).is_empty());
        assert!(engine.capture(ContextId(1)).await.record.is_empty());
        assert!(!engine.end_context(ContextId(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_starts_fresh_store() {
        let mut engine = engine();
        let console = Arc::new(HostConsole::with_handler(|_, _| {}));
        engine.activate(page(1), Arc::clone(&console), None).await;
        console.call("info", &[ArgValue::from("old page")]);

        engine.activate(page(1), Arc::clone(&console), None).await;
        console.call("info", &[ArgValue::from("new page")]);

        let events = engine.peek(ContextId(1));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "new page");
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_includes_page_metadata() {
        let mut engine = engine();
        let console = Arc::new(HostConsole::with_handler(|_, _| {}));
        engine.activate(page(4), Arc::clone(&console), None).await;
        console.call("error", &[ArgValue::from("boom")]);

        let report = engine.capture(ContextId(4)).await;
        assert_eq!(report.origin, "https://app.test/4");
        assert_eq!(report.title, "App");
        assert_eq!(report.record.len(), 1);

        let stats = engine.stats(ContextId(4)).unwrap();
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.intercept.installed, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_channel_on_unknown_context_is_noop() {
        let mut engine = engine();
        assert!(!engine.enable_channel(ContextId(8)).await);
    }
}
