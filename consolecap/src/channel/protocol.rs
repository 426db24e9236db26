//! Inspection protocol messages
//!
//! The privileged channel speaks a DevTools-style protocol. Only the console
//! notification matters here:
//!
//! ```json
//! {"method": "Runtime.consoleAPICalled",
//!  "params": {"type": "log", "args": [...], "executionContextId": 3,
//!             "timestamp": 1700000000123.4,
//!             "stackTrace": {"callFrames": [...]}}}
//! ```
//!
//! Arguments arrive as remote objects with native previews, so objects the
//! in-page stringifier could only describe generically can be rendered with
//! their first few properties here.

use consolecap_common::{
    Level, ANONYMOUS_FUNCTION, CLEAR_MARKER_MESSAGE, MAX_CALL_SITE_FRAMES,
};
use serde::{Deserialize, Serialize};

use crate::domain::{ChannelError, ContextId, Timestamp};
use crate::event_data::{format_number, CallSiteFrame, DiagnosticEvent};

/// Protocol method carrying console calls
pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";

/// Maximum properties rendered from an object preview
const MAX_PREVIEW_PROPERTIES: usize = 5;

/// Generic protocol notification envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalled {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<RemoteObject>,
    pub execution_context_id: u64,
    /// Milliseconds since the epoch, fractional
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<StackTrace>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectPreview {
    #[serde(default)]
    pub properties: Vec<PreviewProperty>,
    #[serde(default)]
    pub overflow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
}

/// Protocol call frame; line and column are 0-based
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub url: String,
    pub line_number: u32,
    pub column_number: u32,
}

impl ProtocolMessage {
    /// Parse one raw message.
    ///
    /// # Errors
    /// Returns [`ChannelError::MalformedMessage`] if the text is not a protocol envelope
    pub fn parse(raw: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(raw).map_err(|e| ChannelError::MalformedMessage(e.to_string()))
    }

    /// Extract the console notification, if this message is one.
    ///
    /// # Errors
    /// Returns [`ChannelError::MalformedMessage`] if the params do not match
    pub fn console_call(&self) -> Result<Option<ConsoleApiCalled>, ChannelError> {
        if self.method != CONSOLE_API_CALLED {
            return Ok(None);
        }
        serde_json::from_value(self.params.clone())
            .map(Some)
            .map_err(|e| ChannelError::MalformedMessage(e.to_string()))
    }
}

impl ConsoleApiCalled {
    #[must_use]
    pub fn context(&self) -> ContextId {
        ContextId(self.execution_context_id)
    }

    /// Severity for a protocol call type
    #[must_use]
    pub fn level(&self) -> Level {
        match self.kind.as_str() {
            "log" => Level::Log,
            "warning" => Level::Warn,
            "error" | "assert" => Level::Error,
            "debug" => Level::Debug,
            _ => Level::Info,
        }
    }

    /// Convert into an event observed on the page at `origin`
    #[must_use]
    pub fn to_event(&self, origin: &str) -> DiagnosticEvent {
        let message = if self.kind == "clear" {
            CLEAR_MARKER_MESSAGE.to_string()
        } else {
            self.args.iter().map(render_remote_object).collect::<Vec<_>>().join(" ")
        };

        let frames = self
            .stack_trace
            .as_ref()
            .map(|trace| {
                trace
                    .call_frames
                    .iter()
                    .take(MAX_CALL_SITE_FRAMES)
                    .map(|frame| CallSiteFrame {
                        function: if frame.function_name.is_empty() {
                            ANONYMOUS_FUNCTION.to_string()
                        } else {
                            frame.function_name.clone()
                        },
                        file: frame.url.clone(),
                        line: frame.line_number.saturating_add(1),
                        column: frame.column_number.saturating_add(1),
                    })
                    .collect()
            })
            .unwrap_or_default();

        DiagnosticEvent::new(self.level(), message, Timestamp::from_millis_f64(self.timestamp), origin)
            .with_call_site(frames)
    }
}

/// Render one argument the way the inspection front-end shows it
#[must_use]
pub fn render_remote_object(obj: &RemoteObject) -> String {
    if let Some(ref raw) = obj.unserializable_value {
        return raw.clone();
    }

    match obj.kind.as_str() {
        "undefined" => return "undefined".to_string(),
        "object" if obj.subtype.as_deref() == Some("null") => return "null".to_string(),
        _ => {}
    }

    match obj.value {
        Some(serde_json::Value::String(ref s)) => return s.clone(),
        Some(serde_json::Value::Number(ref n)) => {
            return n.as_f64().map_or_else(|| n.to_string(), format_number);
        }
        Some(ref value) => {
            return serde_json::to_string(value).unwrap_or_else(|_| "[object Object]".to_string());
        }
        None => {}
    }

    if let Some(ref preview) = obj.preview {
        let label = obj
            .description
            .as_deref()
            .or(obj.class_name.as_deref())
            .unwrap_or("Object");
        return format!("{label} {}", render_preview(preview));
    }

    obj.description.clone().unwrap_or_else(|| format!("[{}]", obj.kind))
}

fn render_preview(preview: &ObjectPreview) -> String {
    let mut parts: Vec<String> = preview
        .properties
        .iter()
        .take(MAX_PREVIEW_PROPERTIES)
        .map(|p| {
            let value = match (p.kind.as_str(), p.value.as_deref()) {
                ("string", Some(v)) => format!("'{v}'"),
                (_, Some(v)) => v.to_string(),
                (kind, None) => kind.to_string(),
            };
            format!("{}: {value}", p.name)
        })
        .collect();

    if preview.overflow || preview.properties.len() > MAX_PREVIEW_PROPERTIES {
        parts.push("…".to_string());
    }
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERROR_WITH_PREVIEW: &str = r#"{
        "method": "Runtime.consoleAPICalled",
        "params": {
            "type": "error",
            "executionContextId": 7,
            "timestamp": 1700000000100.75,
            "args": [
                {"type": "string", "value": "Render failed"},
                {"type": "object", "className": "Node", "description": "HTMLDivElement",
                 "preview": {"overflow": true, "properties": [
                    {"name": "id", "type": "string", "value": "root"},
                    {"name": "childCount", "type": "number", "value": "3"}
                 ]}}
            ],
            "stackTrace": {"callFrames": [
                {"functionName": "", "url": "https://app.test/main.js", "lineNumber": 9, "columnNumber": 4},
                {"functionName": "boot", "url": "https://app.test/main.js", "lineNumber": 41, "columnNumber": 0}
            ]}
        }
    }"#;

    #[test]
    fn test_console_call_converted_with_preview_and_frames() {
        let message = ProtocolMessage::parse(ERROR_WITH_PREVIEW).unwrap();
        let call = message.console_call().unwrap().unwrap();
        assert_eq!(call.context(), ContextId(7));

        let event = call.to_event("https://app.test/");
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.timestamp, Timestamp(1_700_000_000_100));
        assert_eq!(event.message, "Render failed HTMLDivElement {id: 'root', childCount: 3, …}");

        let frames = event.call_site.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function, ANONYMOUS_FUNCTION);
        assert_eq!((frames[0].line, frames[0].column), (10, 5));
        assert_eq!(frames[1].function, "boot");
    }

    #[test]
    fn test_other_methods_ignored() {
        let message = ProtocolMessage::parse(r#"{"method": "Page.loadEventFired", "params": {}}"#).unwrap();
        assert!(message.console_call().unwrap().is_none());
    }

    #[test]
    fn test_malformed_params_rejected() {
        let message =
            ProtocolMessage::parse(r#"{"method": "Runtime.consoleAPICalled", "params": {"type": 3}}"#).unwrap();
        assert!(matches!(message.console_call(), Err(ChannelError::MalformedMessage(_))));
        assert!(ProtocolMessage::parse("not json").is_err());
    }

    #[test]
    fn test_primitive_rendering_matches_in_page_text() {
        let args = [
            RemoteObject { kind: "number".into(), value: Some(serde_json::json!(1)), ..Default::default() },
            RemoteObject { kind: "undefined".into(), ..Default::default() },
            RemoteObject { kind: "object".into(), subtype: Some("null".into()), ..Default::default() },
            RemoteObject { kind: "number".into(), unserializable_value: Some("NaN".into()), ..Default::default() },
            RemoteObject { kind: "object".into(), value: Some(serde_json::json!({"x": 1})), ..Default::default() },
        ];
        let rendered: Vec<String> = args.iter().map(render_remote_object).collect();
        assert_eq!(rendered, vec!["1", "undefined", "null", "NaN", r#"{"x":1}"#]);
    }

    #[test]
    fn test_level_mapping_and_clear() {
        let call = |kind: &str| ConsoleApiCalled {
            kind: kind.to_string(),
            args: Vec::new(),
            execution_context_id: 1,
            timestamp: 5.0,
            stack_trace: None,
        };
        assert_eq!(call("warning").level(), Level::Warn);
        assert_eq!(call("assert").level(), Level::Error);
        assert_eq!(call("table").level(), Level::Info);

        let cleared = call("clear").to_event("https://app.test/");
        assert_eq!(cleared.message, CLEAR_MARKER_MESSAGE);
        assert!(cleared.call_site.is_none());
    }

    #[test]
    fn test_out_of_range_positions_saturate() {
        let call = ConsoleApiCalled {
            kind: "log".to_string(),
            args: Vec::new(),
            execution_context_id: 1,
            timestamp: 5.0,
            stack_trace: Some(StackTrace {
                call_frames: vec![CallFrame {
                    function_name: "f".into(),
                    url: "https://app.test/main.js".into(),
                    line_number: u32::MAX,
                    column_number: u32::MAX,
                }],
            }),
        };
        let frames = call.to_event("https://app.test/").call_site.unwrap();
        assert_eq!((frames[0].line, frames[0].column), (u32::MAX, u32::MAX));
    }
}
