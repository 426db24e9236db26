use consolecap::channel::replay_log;
use consolecap::export::read_events;
use consolecap::merge::{MarkerTokens, Merger};
use consolecap_common::Level;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn load_fixtures() -> (Vec<consolecap::event_data::DiagnosticEvent>, Vec<consolecap::event_data::DiagnosticEvent>) {
    let store = read_events(BufReader::new(File::open(fixture("store.json")).unwrap())).unwrap();
    let log = replay_log(
        BufReader::new(File::open(fixture("devtools.jsonl")).unwrap()),
        "https://shop.test/checkout",
    )
    .unwrap();
    assert_eq!(log.ignored, 1);
    assert_eq!(log.skipped, 1);
    (store, log.events)
}

#[test]
fn test_fixture_merge_dedups_and_orders() {
    let (store, channel) = load_fixtures();
    assert_eq!(store.len(), 4);
    assert_eq!(channel.len(), 4);

    let record = Merger::default().merge(&store, &channel);
    let summary: Vec<(u64, &str)> =
        record.iter().map(|e| (e.timestamp.0, e.message.as_str())).collect();
    assert_eq!(
        summary,
        vec![
            (50, "early boot"),
            (90, "Session restored"),
            (100, "KAPTIO init"),
            (120, "Cart loaded"),
            (150, "Payment failed PaymentError {code: 'card_declined', retryable: false}"),
            (150, "Payment failed [object PaymentError]"),
        ]
    );

    // The channel copy of the duplicate carries the call site
    let kaptio = &record.events[2];
    assert_eq!(kaptio.call_site_len(), 2);
    let frames = kaptio.call_site.as_ref().unwrap();
    assert_eq!(frames[0].function, "initKaptio");
    assert_eq!((frames[0].line, frames[0].column), (10, 5));

    assert_eq!(record.events[0].level, Level::Debug);
    assert_eq!(record.events[0].call_site.as_ref().unwrap()[0].function, "<anonymous>");
}

#[test]
fn test_fixture_merge_is_idempotent() {
    let (store, channel) = load_fixtures();
    let merger = Merger::new(Box::new(MarkerTokens::new(["KAPTIO"])));

    let once = merger.merge(&store, &channel);
    let twice = merger.merge(&once.events, &[]);
    assert_eq!(once, twice);
}

#[test]
fn test_merge_command_exports_record() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged.json");

    let status = Command::new(env!("CARGO_BIN_EXE_consolecap"))
        .args(["merge", "--quiet", "--store"])
        .arg(fixture("store.json"))
        .arg("--channel")
        .arg(fixture("devtools.jsonl"))
        .arg("--export")
        .arg(&out)
        .status()
        .expect("Failed to run consolecap");
    assert!(status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let events = json.as_array().unwrap();
    assert_eq!(events.len(), 6);
    assert_eq!(events[2]["message"], "KAPTIO init");
    assert_eq!(events[2]["callSite"].as_array().unwrap().len(), 2);
}

#[test]
fn test_merge_command_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.json");
    std::fs::write(&config, r#"{"store_capacity": 0}"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_consolecap"))
        .arg("--config")
        .arg(&config)
        .args(["merge", "--store"])
        .arg(fixture("store.json"))
        .output()
        .expect("Failed to run consolecap");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("store_capacity"));
}

#[test]
fn test_merge_command_missing_store_is_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_consolecap"))
        .args(["merge", "--store", "/nonexistent/store.json"])
        .output()
        .expect("Failed to run consolecap");

    assert_eq!(output.status.code(), Some(1));
}
