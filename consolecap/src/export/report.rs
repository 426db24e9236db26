//! # Bug Report Assembly
//!
//! Screenshot acquisition and ticket submission live outside the engine. They
//! are reached through two single-outcome async traits:
//!
//! ```text
//! ScreenshotSource::capture() ──▶ Option<Vec<u8>>
//!                                     │
//! CaptureReport ──▶ BugReport::assemble ──▶ ReportSink::submit ──▶ TicketRef
//! ```
//!
//! [`JsonFileSink`] is the bundled sink; it stands in for a ticketing system
//! by writing each report into a directory.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{ExportError, SubmitError, Timestamp};
use crate::engine::CaptureReport;
use crate::merge::MergedRecord;

/// Reference to a created ticket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketRef(pub String);

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    /// Image payload, or `None` when acquisition failed
    async fn capture(&self) -> Option<Vec<u8>>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, report: BugReport) -> Result<TicketRef, SubmitError>;
}

/// Screenshot source that never produces an image
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScreenshot;

#[async_trait]
impl ScreenshotSource for NoScreenshot {
    async fn capture(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Screenshot source returning a fixed payload
#[derive(Debug, Default, Clone)]
pub struct StaticScreenshot(pub Vec<u8>);

#[async_trait]
impl ScreenshotSource for StaticScreenshot {
    async fn capture(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BugReport {
    pub summary: String,
    pub description: String,
    pub origin: String,
    pub title: String,
    pub record: MergedRecord,
    /// Serialized as the payload size only
    #[serde(rename = "screenshotBytes", serialize_with = "serialize_payload_len")]
    pub screenshot: Option<Vec<u8>>,
}

fn serialize_payload_len<S: Serializer>(
    payload: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    payload.as_ref().map(Vec::len).serialize(serializer)
}

impl BugReport {
    #[must_use]
    pub fn assemble(
        summary: impl Into<String>,
        description: impl Into<String>,
        capture: CaptureReport,
        screenshot: Option<Vec<u8>>,
    ) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            origin: capture.origin,
            title: capture.title,
            record: capture.record,
            screenshot,
        }
    }
}

/// Acquire a screenshot, assemble the report and submit it.
///
/// A missing screenshot does not block submission.
///
/// # Errors
/// Returns the sink's error unchanged
pub async fn file_report(
    screenshots: &dyn ScreenshotSource,
    sink: &dyn ReportSink,
    summary: &str,
    description: &str,
    capture: CaptureReport,
) -> Result<TicketRef, SubmitError> {
    let screenshot = screenshots.capture().await;
    if screenshot.is_none() {
        debug!("No screenshot available, submitting without one");
    }
    let report = BugReport::assemble(summary, description, capture, screenshot);
    sink.submit(report).await
}

/// Writes each submitted report as pretty JSON into a directory
#[derive(Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl JsonFileSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sequence: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn submit(&self, report: BugReport) -> Result<TicketRef, SubmitError> {
        if report.summary.trim().is_empty() {
            return Err(SubmitError::Rejected("summary is empty".into()));
        }

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stem = format!("report-{}-{seq}", Timestamp::now().0);
        let body = serde_json::to_vec_pretty(&report).map_err(ExportError::from)?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(ExportError::from)?;
        let path = self.dir.join(format!("{stem}.json"));
        tokio::fs::write(&path, body).await.map_err(ExportError::from)?;

        info!("Report written to {} ({} events)", path.display(), report.record.len());
        Ok(TicketRef(stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_data::DiagnosticEvent;
    use consolecap_common::Level;

    fn capture() -> CaptureReport {
        CaptureReport {
            origin: "https://shop.test/cart".into(),
            title: "Cart".into(),
            record: MergedRecord {
                events: vec![DiagnosticEvent::new(
                    Level::Error,
                    "checkout failed",
                    Timestamp(1_700_000_000_000),
                    "https://shop.test/cart",
                )],
            },
        }
    }

    #[test]
    fn test_screenshot_serialized_as_length() {
        let report = BugReport::assemble("s", "d", capture(), Some(vec![0u8; 42]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["screenshotBytes"], 42);
        assert_eq!(json["record"][0]["message"], "checkout failed");

        let bare = BugReport::assemble("s", "d", capture(), None);
        assert!(serde_json::to_value(&bare).unwrap()["screenshotBytes"].is_null());
    }

    #[tokio::test]
    async fn test_json_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());

        let ticket = file_report(&StaticScreenshot(vec![1, 2, 3]), &sink, "Cart broken", "", capture())
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join(format!("{ticket}.json"))).unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["summary"], "Cart broken");
        assert_eq!(json["title"], "Cart");
        assert_eq!(json["screenshotBytes"], 3);
    }

    #[tokio::test]
    async fn test_empty_summary_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let err = file_report(&NoScreenshot, &sink, "  ", "", capture()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
    }
}
