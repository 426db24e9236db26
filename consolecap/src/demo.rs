//! # Simulated Page
//!
//! Drives a [`CaptureEngine`] against a scripted page so the whole pipeline
//! can be watched without a browser. The page owns its console, mirrors every
//! call to an in-process inspector the way a privileged host would, and (in
//! hostile mode) throws its console away mid-boot to install a vendor one.
//!
//! ## Script (100 ms steps)
//!
//! ```text
//! before activation   "Booting demo app"         channel only
//! step 0..5           config, structured, warn, opaque error
//! step 10 (hostile)   console replaced wholesale + mutation burst
//! step 10..12         vendor SDK calls           recovered by the watchdog
//! step 20             console.clear()
//! every 10 steps      heartbeat
//! ```

use anyhow::Result;
use consolecap_common::ConsoleMethod;
use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::capture::{mutation_channel, DiagnosticFn, HostConsole, MutationBurst, MutationFeed};
use crate::channel::protocol::{
    CallFrame, ConsoleApiCalled, ObjectPreview, PreviewProperty, RemoteObject, StackTrace,
    CONSOLE_API_CALLED,
};
use crate::channel::BufferedInspector;
use crate::config::EngineConfig;
use crate::display::{display_event, display_statistics};
use crate::domain::{ContextId, PageInfo, Timestamp};
use crate::engine::{CaptureEngine, CaptureReport, SessionStats};
use crate::event_data::{stringify_args, ArgValue, Primitive, PropertyPreview};

const STEP: Duration = Duration::from_millis(100);
const SCRIPT_URL: &str = "https://demo.consolecap.test/static/app.js";

#[derive(Debug, Clone, Copy)]
pub struct DemoOptions {
    pub duration: Duration,
    /// Replace the console mid-boot
    pub hostile: bool,
    /// Attach the inspection channel
    pub channel: bool,
    /// Print statistics instead of streaming events
    pub headless: bool,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self { duration: Duration::from_secs(5), hostile: true, channel: true, headless: false }
    }
}

#[derive(Debug)]
pub struct DemoOutcome {
    pub report: CaptureReport,
    pub stats: Option<SessionStats>,
    /// Events seen on the live tap
    pub streamed: usize,
    pub exit_reason: &'static str,
}

/// Native console of the simulated page: writes to the `page` log target
fn native_console() -> HostConsole {
    HostConsole::with_handler(|method, args| {
        debug!(target: "page", "console.{}: {}", method.name(), stringify_args(args));
    })
}

/// Serialize an argument the way the privileged host reports it
fn remote_object(arg: &ArgValue) -> RemoteObject {
    match arg {
        ArgValue::Primitive(Primitive::Undefined) => {
            RemoteObject { kind: "undefined".into(), ..RemoteObject::default() }
        }
        ArgValue::Primitive(Primitive::Null) => RemoteObject {
            kind: "object".into(),
            subtype: Some("null".into()),
            value: Some(serde_json::Value::Null),
            ..RemoteObject::default()
        },
        ArgValue::Primitive(Primitive::Bool(b)) => {
            RemoteObject { kind: "boolean".into(), value: Some(json!(b)), ..RemoteObject::default() }
        }
        ArgValue::Primitive(Primitive::Number(n)) if n.is_finite() => {
            RemoteObject { kind: "number".into(), value: Some(json!(n)), ..RemoteObject::default() }
        }
        ArgValue::Primitive(Primitive::Number(n)) => RemoteObject {
            kind: "number".into(),
            unserializable_value: Some(crate::event_data::format_number(*n)),
            ..RemoteObject::default()
        },
        ArgValue::Primitive(Primitive::String(s)) => {
            RemoteObject { kind: "string".into(), value: Some(json!(s)), ..RemoteObject::default() }
        }
        ArgValue::Structured(value) => {
            RemoteObject { kind: "object".into(), value: Some(value.clone()), ..RemoteObject::default() }
        }
        ArgValue::Opaque { class_name, preview } => RemoteObject {
            kind: "object".into(),
            class_name: Some(class_name.clone()),
            description: Some(class_name.clone()),
            preview: Some(ObjectPreview {
                properties: preview
                    .iter()
                    .map(|p| PreviewProperty {
                        name: p.name.clone(),
                        kind: "string".into(),
                        value: Some(p.value.clone()),
                    })
                    .collect(),
                overflow: false,
            }),
            ..RemoteObject::default()
        },
        ArgValue::Unknown(tag) => RemoteObject { kind: tag.clone(), ..RemoteObject::default() },
    }
}

fn protocol_kind(method: ConsoleMethod) -> &'static str {
    match method {
        ConsoleMethod::Warn => "warning",
        other => other.name(),
    }
}

struct SimulatedPage {
    page: PageInfo,
    console: Arc<HostConsole>,
    inspector: Arc<BufferedInspector>,
    mutations: MutationFeed,
}

impl SimulatedPage {
    /// Call the page's console and mirror the call to the inspector
    fn emit(&self, method: ConsoleMethod, args: &[ArgValue], function: &str, line: u32) {
        #[allow(clippy::cast_precision_loss)]
        let millis = Timestamp::now().0 as f64;
        self.console.call(method.name(), args);

        let call = ConsoleApiCalled {
            kind: protocol_kind(method).to_string(),
            args: args.iter().map(remote_object).collect(),
            execution_context_id: self.page.context.0,
            timestamp: millis,
            stack_trace: Some(StackTrace {
                call_frames: vec![
                    CallFrame {
                        function_name: function.to_string(),
                        url: SCRIPT_URL.to_string(),
                        line_number: line,
                        column_number: 4,
                    },
                    CallFrame {
                        function_name: String::new(),
                        url: SCRIPT_URL.to_string(),
                        line_number: 2,
                        column_number: 0,
                    },
                ],
            }),
        };
        let raw = json!({ "method": CONSOLE_API_CALLED, "params": call }).to_string();
        if let Err(e) = self.inspector.ingest_json(&raw) {
            warn!("Inspector rejected mirrored call: {e}");
        }
    }

    /// The page discards its console and installs a vendor replacement
    fn hijack(&self) {
        let vendor: Vec<(String, DiagnosticFn)> = ConsoleMethod::ALL
            .iter()
            .map(|&method| {
                let func: DiagnosticFn = Arc::new(move |args: &[ArgValue]| {
                    debug!(target: "page", "[vendor] {}: {}", method.name(), stringify_args(args));
                });
                (method.name().to_string(), func)
            })
            .collect();
        self.console.replace_all(vendor);
        if self.mutations.send(MutationBurst { added: 3, removed: 1 }).is_err() {
            debug!("Mutation observer already gone");
        }
        info!("Page replaced its console");
    }

    fn step(&self, step: u64, hostile: bool) {
        use ConsoleMethod::{Clear, Error, Info, Log, Warn};
        match step {
            0 => self.emit(Log, &["Loading config".into()], "loadConfig", 12),
            1 => self.emit(
                Info,
                &["config".into(), json!({"theme": "dark", "retries": 3}).into()],
                "loadConfig",
                18,
            ),
            3 => self.emit(Warn, &["Slow network:".into(), ArgValue::from(812.0), "ms".into()], "fetchUser", 40),
            5 => self.emit(
                Error,
                &[
                    "Session invalid".into(),
                    ArgValue::Opaque {
                        class_name: "Session".into(),
                        preview: vec![
                            PropertyPreview { name: "user".into(), value: "ada".into() },
                            PropertyPreview { name: "state".into(), value: "expired".into() },
                        ],
                    },
                ],
                "restoreSession",
                77,
            ),
            10 if hostile => {
                self.hijack();
                self.emit(Log, &["vendor SDK ready".into()], "vendorInit", 5);
            }
            12 if hostile => self.emit(Info, &["vendor SDK attached listeners".into()], "vendorInit", 9),
            20 => {
                self.emit(Clear, &[], "resetView", 101);
                self.emit(Info, &["view reset".into()], "resetView", 102);
            }
            s if s % 10 == 0 => self.emit(Log, &[format!("heartbeat {}", s / 10).into()], "tick", 150),
            _ => {}
        }
    }
}

/// Run the scripted page for `options.duration` (or until Ctrl+C).
///
/// # Errors
/// Returns an error if the engine cannot be driven (e.g. no Ctrl+C handler)
pub async fn run_demo(config: EngineConfig, options: DemoOptions) -> Result<DemoOutcome> {
    let context = ContextId(1);
    let page_info = PageInfo::new(context, "https://demo.consolecap.test/app", "Demo App");
    let inspector = Arc::new(BufferedInspector::with_capacity(config.store_capacity));
    inspector.open_context(&page_info);

    let (feed, mutations) = mutation_channel();
    let page = SimulatedPage {
        page: page_info.clone(),
        console: Arc::new(native_console()),
        inspector: Arc::clone(&inspector),
        mutations: feed,
    };

    // Emitted before the engine exists: only the inspector sees it
    page.emit(ConsoleMethod::Info, &["Booting demo app".into()], "main", 1);

    let mut engine = CaptureEngine::new(config, Arc::clone(&inspector));
    let tap = engine.live_tap();
    let report = engine.activate(page_info, Arc::clone(&page.console), Some(mutations)).await;
    info!("Wrappers installed: {}, fallback: {}, failed: {}", report.installed, report.assigned, report.failed);

    if options.channel && !engine.enable_channel(context).await {
        warn!("Inspection channel unavailable, continuing in-page only");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let start = Instant::now();
    let mut step = 0u64;
    let mut streamed = 0usize;
    let mut exit_reason = "duration limit reached";

    loop {
        if start.elapsed() >= options.duration {
            break;
        }

        page.step(step, options.hostile);
        step += 1;

        for event in tap.try_iter() {
            streamed += 1;
            if !options.headless {
                display_event(&event);
            }
        }

        if options.headless && step % 20 == 0 {
            if let Some(stats) = engine.stats(context) {
                display_statistics(context, &stats);
            }
        }

        tokio::select! {
            () = tokio::time::sleep(STEP) => {}
            _ = &mut ctrl_c => {
                exit_reason = "interrupted";
                break;
            }
        }
    }

    streamed += tap.try_iter().count();
    let stats = engine.stats(context);
    let report = engine.capture(context).await;
    engine.end_context(context).await;
    inspector.close_context(context);

    Ok(DemoOutcome { report, stats, streamed, exit_reason })
}
