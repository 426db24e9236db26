//! Headless output for captured events and session counters

use consolecap_common::Level;
use std::collections::BTreeMap;

use crate::domain::ContextId;
use crate::engine::SessionStats;
use crate::event_data::DiagnosticEvent;
use crate::merge::MergedRecord;

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Log => "LOG",
        Level::Info => "INFO",
        Level::Warn => "WARN",
        Level::Error => "ERROR",
        Level::Debug => "DEBUG",
    }
}

/// One line per event, plus the innermost call-site frame if known
#[must_use]
pub fn format_event(event: &DiagnosticEvent) -> String {
    let mut line = format!("[{}] {} {}", level_tag(event.level), event.timestamp, event.message);
    if let Some(frame) = event.call_site.as_ref().and_then(|frames| frames.first()) {
        line.push_str("\n  ");
        line.push_str(&frame.to_string());
    }
    line
}

/// Display a live captured event
pub fn display_event(event: &DiagnosticEvent) {
    println!("{}", format_event(event));
}

/// Display session statistics
pub fn display_statistics(context: ContextId, stats: &SessionStats) {
    eprintln!(
        "stats {context}: stored={} evicted={} captured={} installs={} fallback={} rewraps_skipped={} install_failures={} ticks={} timer_passes={} mutation_passes={} tap_dropped={}",
        stats.stored,
        stats.evicted,
        stats.intercept.captured,
        stats.intercept.installed,
        stats.intercept.fallback_installed,
        stats.intercept.already_wrapped,
        stats.intercept.install_failures,
        stats.watchdog.ticks,
        stats.watchdog.timer_passes,
        stats.watchdog.mutation_passes,
        stats.intercept.tap_dropped,
    );
}

/// Count of events per level, keyed by level name
#[must_use]
pub fn level_breakdown(record: &MergedRecord) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in record.iter() {
        *counts.entry(event.level.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Display a one-line summary of a merged record
pub fn display_record_summary(record: &MergedRecord) {
    let breakdown = level_breakdown(record)
        .into_iter()
        .map(|(level, n)| format!("{level}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    eprintln!("record: {} events ({breakdown})", record.len());
}
