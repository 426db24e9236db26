//! # Persistence Watchdog
//!
//! The host owns the console and may replace it, or any of its methods, long
//! after our wrappers went in (typically during its own delayed boot). Change
//! detection is not reliable, so the watchdog simply re-asserts installation,
//! idempotently, on two independent triggers:
//!
//! - **Timer**: every tick during the dense phase, every k-th tick during the
//!   sparse phase, then stop at a hard ceiling.
//! - **Structural mutations**: each burst reported by the host page triggers an
//!   immediate pass, until the observation window closes.
//!
//! ```text
//! Active(dense) ──N ticks──▶ Active(sparse) ──ceiling──▶ Stopped
//! ```
//!
//! Both tasks stop at their natural limits and whenever the watchdog is
//! stopped or dropped (context end).

use consolecap_common::{
    MUTATION_WINDOW_SECS, WATCHDOG_DENSE_TICKS, WATCHDOG_MAX_TICKS, WATCHDOG_SPARSE_STRIDE,
    WATCHDOG_TICK_MS,
};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::interceptor::Interceptor;

/// One burst of structural changes in the host page's rendered content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationBurst {
    pub added: usize,
    pub removed: usize,
}

/// Host-side handle used to report structural mutations
pub type MutationFeed = mpsc::UnboundedSender<MutationBurst>;

/// Create a mutation feed and the receiver handed to the watchdog
#[must_use]
pub fn mutation_channel() -> (MutationFeed, mpsc::UnboundedReceiver<MutationBurst>) {
    mpsc::unbounded_channel()
}

/// Timing parameters of the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub tick: Duration,
    pub dense_ticks: u64,
    pub sparse_stride: u64,
    pub max_ticks: u64,
    pub mutation_window: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(WATCHDOG_TICK_MS),
            dense_ticks: WATCHDOG_DENSE_TICKS,
            sparse_stride: WATCHDOG_SPARSE_STRIDE,
            max_ticks: WATCHDOG_MAX_TICKS,
            mutation_window: Duration::from_secs(MUTATION_WINDOW_SECS),
        }
    }
}

/// Watchdog phase at a given tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    Dense,
    Sparse,
    Stopped,
}

/// What the timer does on a given tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Reinstall,
    Idle,
    Stop,
}

impl WatchdogConfig {
    /// Phase for a 1-based tick number
    #[must_use]
    pub fn phase(&self, tick: u64) -> WatchdogPhase {
        if tick > self.max_ticks {
            WatchdogPhase::Stopped
        } else if tick <= self.dense_ticks {
            WatchdogPhase::Dense
        } else {
            WatchdogPhase::Sparse
        }
    }

    /// Action for a 1-based tick number
    #[must_use]
    pub fn action(&self, tick: u64) -> TickAction {
        match self.phase(tick) {
            WatchdogPhase::Dense => TickAction::Reinstall,
            WatchdogPhase::Sparse if tick % self.sparse_stride.max(1) == 0 => TickAction::Reinstall,
            WatchdogPhase::Sparse => TickAction::Idle,
            WatchdogPhase::Stopped => TickAction::Stop,
        }
    }
}

/// Snapshot of watchdog activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogCounters {
    pub ticks: u64,
    pub timer_passes: u64,
    pub mutation_passes: u64,
}

#[derive(Debug, Default)]
struct WatchdogStats {
    ticks: AtomicU64,
    timer_passes: AtomicU64,
    mutation_passes: AtomicU64,
}

/// Running watchdog for one page context
pub struct Watchdog {
    shutdown: watch::Sender<bool>,
    /// Timer task first, then the observer task when present
    tasks: Vec<JoinHandle<()>>,
    stats: Arc<WatchdogStats>,
}

impl Watchdog {
    /// Spawn the timer task and, when a mutation feed is given, the observer.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        interceptor: Arc<Interceptor>,
        config: WatchdogConfig,
        mutations: Option<mpsc::UnboundedReceiver<MutationBurst>>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(WatchdogStats::default());

        let mut tasks = vec![tokio::spawn(run_timer(
            Arc::clone(&interceptor),
            config,
            shutdown_rx.clone(),
            Arc::clone(&stats),
        ))];
        if let Some(rx) = mutations {
            tasks.push(tokio::spawn(run_observer(
                interceptor,
                config.mutation_window,
                rx,
                shutdown_rx,
                Arc::clone(&stats),
            )));
        }

        Self { shutdown, tasks, stats }
    }

    #[must_use]
    pub fn counters(&self) -> WatchdogCounters {
        WatchdogCounters {
            ticks: self.stats.ticks.load(Ordering::Relaxed),
            timer_passes: self.stats.timer_passes.load(Ordering::Relaxed),
            mutation_passes: self.stats.mutation_passes.load(Ordering::Relaxed),
        }
    }

    /// Whether both tasks have finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Signal both tasks to stop
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop and wait for both tasks to finish
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run_timer(
    interceptor: Arc<Interceptor>,
    config: WatchdogConfig,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<WatchdogStats>,
) {
    let mut interval = tokio::time::interval(config.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; activation already ran a pass
    interval.tick().await;

    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                debug!("Watchdog timer cancelled after {tick} ticks");
                return;
            }
        }

        tick += 1;
        stats.ticks.store(tick, Ordering::Relaxed);
        match config.action(tick) {
            TickAction::Reinstall => {
                let report = interceptor.install_all();
                stats.timer_passes.fetch_add(1, Ordering::Relaxed);
                if report.installed + report.assigned > 0 {
                    debug!("Tick {tick}: re-installed {} wrappers", report.installed + report.assigned);
                }
            }
            TickAction::Idle => {}
            TickAction::Stop => {
                info!("Watchdog timer reached ceiling of {} ticks, stopping", config.max_ticks);
                return;
            }
        }
    }
}

async fn run_observer(
    interceptor: Arc<Interceptor>,
    window: Duration,
    mut mutations: mpsc::UnboundedReceiver<MutationBurst>,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<WatchdogStats>,
) {
    let window_closed = tokio::time::sleep(window);
    tokio::pin!(window_closed);

    loop {
        tokio::select! {
            burst = mutations.recv() => {
                let Some(burst) = burst else {
                    debug!("Mutation feed closed by host");
                    return;
                };
                // Coalesce everything already queued into one pass
                let mut bursts = 1;
                while mutations.try_recv().is_ok() {
                    bursts += 1;
                }
                interceptor.install_all();
                stats.mutation_passes.fetch_add(1, Ordering::Relaxed);
                debug!("Mutation pass after {bursts} burst(s), first +{} -{}", burst.added, burst.removed);
            }
            () = &mut window_closed => {
                info!("Mutation observation window of {window:?} closed, disconnecting observer");
                return;
            }
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::call_site::{CallSiteExtractor, StaticStack};
    use crate::capture::event_store::EventStore;
    use crate::capture::host_console::HostConsole;
    use crate::event_data::ArgValue;
    use consolecap_common::ConsoleMethod;

    fn interceptor() -> Arc<Interceptor> {
        let console = Arc::new(HostConsole::with_handler(|_, _| {}));
        let interceptor = Interceptor::new(
            console,
            EventStore::shared(100),
            CallSiteExtractor::new(Arc::new(StaticStack::default())),
            "https://app.test/",
            None,
        );
        interceptor.install_all();
        Arc::new(interceptor)
    }

    fn hijack_log(interceptor: &Interceptor) {
        interceptor.console().set("log", Arc::new(|_: &[ArgValue]| {}));
        assert!(!interceptor.is_wrapped(ConsoleMethod::Log));
    }

    #[test]
    fn test_default_schedule() {
        let config = WatchdogConfig::default();
        assert_eq!(config.action(1), TickAction::Reinstall);
        assert_eq!(config.action(150), TickAction::Reinstall);
        assert_eq!(config.action(151), TickAction::Idle);
        assert_eq!(config.action(155), TickAction::Reinstall);
        assert_eq!(config.action(3000), TickAction::Reinstall);
        assert_eq!(config.action(3001), TickAction::Stop);
        assert_eq!(config.phase(200), WatchdogPhase::Sparse);
    }

    #[test]
    fn test_sparse_phase_reinstalls_every_kth_tick() {
        let config = WatchdogConfig::default();
        let passes = (151..=3000).filter(|&t| config.action(t) == TickAction::Reinstall).count();
        assert_eq!(passes, (3000 - 150) / 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restores_hijacked_method() {
        let interceptor = interceptor();
        let watchdog = Watchdog::spawn(Arc::clone(&interceptor), WatchdogConfig::default(), None);

        hijack_log(&interceptor);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(interceptor.is_wrapped(ConsoleMethod::Log));
        assert!(watchdog.counters().timer_passes >= 1);
        watchdog.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_stops_at_ceiling() {
        let config = WatchdogConfig {
            tick: Duration::from_millis(10),
            dense_ticks: 3,
            sparse_stride: 2,
            max_ticks: 6,
            mutation_window: Duration::from_secs(1),
        };
        let watchdog = Watchdog::spawn(interceptor(), config, None);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(watchdog.is_finished());
        let counters = watchdog.counters();
        assert_eq!(counters.ticks, 7);
        // ticks 1..=3 dense, then 4 and 6
        assert_eq!(counters.timer_passes, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_triggers_immediate_pass() {
        let config = WatchdogConfig { tick: Duration::from_secs(3600), ..WatchdogConfig::default() };
        let interceptor = interceptor();
        let (feed, rx) = mutation_channel();
        let watchdog = Watchdog::spawn(Arc::clone(&interceptor), config, Some(rx));

        hijack_log(&interceptor);
        feed.send(MutationBurst { added: 3, removed: 0 }).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(interceptor.is_wrapped(ConsoleMethod::Log));
        assert_eq!(watchdog.counters().mutation_passes, 1);
        assert_eq!(watchdog.counters().timer_passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_torn_down_after_window() {
        let config = WatchdogConfig { tick: Duration::from_secs(3600), ..WatchdogConfig::default() };
        let (feed, rx) = mutation_channel();
        let watchdog = Watchdog::spawn(interceptor(), config, Some(rx));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(feed.send(MutationBurst::default()).is_err());
        assert_eq!(watchdog.counters().mutation_passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_both_tasks() {
        let (_feed, rx) = mutation_channel();
        let watchdog = Watchdog::spawn(interceptor(), WatchdogConfig::default(), Some(rx));

        watchdog.stop();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(watchdog.is_finished());
    }
}
