use async_trait::async_trait;
use consolecap::capture::{HostConsole, StaticStack};
use consolecap::channel::BufferedInspector;
use consolecap::config::EngineConfig;
use consolecap::domain::{ContextId, PageInfo, SubmitError};
use consolecap::engine::CaptureEngine;
use consolecap::export::{file_report, BugReport, JsonFileSink, NoScreenshot, ReportSink, StaticScreenshot, TicketRef};
use std::sync::{Arc, Mutex};

const CTX: ContextId = ContextId(9);

async fn captured_engine() -> (CaptureEngine<BufferedInspector>, Arc<HostConsole>) {
    let mut engine = CaptureEngine::new(EngineConfig::default(), Arc::new(BufferedInspector::default()))
        .with_stack_source(Arc::new(StaticStack::default()));
    let console = Arc::new(HostConsole::with_handler(|_, _| {}));
    engine
        .activate(PageInfo::new(CTX, "https://crm.test/leads/42", "Lead 42"), Arc::clone(&console), None)
        .await;
    (engine, console)
}

/// Sink that keeps submitted reports in memory
#[derive(Default)]
struct MemorySink {
    reports: Mutex<Vec<BugReport>>,
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn submit(&self, report: BugReport) -> Result<TicketRef, SubmitError> {
        let mut reports = self.reports.lock().unwrap();
        reports.push(report);
        Ok(TicketRef(format!("BUG-{}", reports.len())))
    }
}

#[tokio::test(start_paused = true)]
async fn test_capture_flows_into_submitted_report() {
    let (engine, console) = captured_engine().await;
    console.call("warn", &["quota at 90%".into()]);
    console.call("error", &["save failed".into()]);

    let sink = MemorySink::default();
    let capture = engine.capture(CTX).await;
    let ticket = file_report(&NoScreenshot, &sink, "Save broken", "Clicked save twice", capture)
        .await
        .unwrap();
    assert_eq!(ticket, TicketRef("BUG-1".into()));

    let reports = sink.reports.lock().unwrap();
    let report = &reports[0];
    assert_eq!(report.origin, "https://crm.test/leads/42");
    assert_eq!(report.title, "Lead 42");
    assert_eq!(report.record.len(), 2);
    assert_eq!(report.record.events[1].message, "save failed");
    assert!(report.screenshot.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_json_file_sink_round_trip() {
    let (engine, console) = captured_engine().await;
    console.call("log", &["hello".into()]);

    let dir = tempfile::tempdir().unwrap();
    let sink = JsonFileSink::new(dir.path().join("reports"));
    let ticket = file_report(
        &StaticScreenshot(vec![0x89, 0x50, 0x4e, 0x47]),
        &sink,
        "Greeting shown",
        "",
        engine.capture(CTX).await,
    )
    .await
    .unwrap();

    let path = dir.path().join("reports").join(format!("{ticket}.json"));
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["screenshotBytes"], 4);
    assert_eq!(json["record"][0]["level"], "log");
    assert_eq!(json["record"][0]["origin"], "https://crm.test/leads/42");
}

#[tokio::test(start_paused = true)]
async fn test_capture_of_ended_context_is_empty() {
    let (mut engine, console) = captured_engine().await;
    console.call("log", &["gone soon".into()]);
    engine.end_context(CTX).await;

    let sink = MemorySink::default();
    file_report(&NoScreenshot, &sink, "Empty", "", engine.capture(CTX).await).await.unwrap();
    assert!(sink.reports.lock().unwrap()[0].record.is_empty());
}
