//! Event data model shared by the store, the channel and the merger
//!
//! [`DiagnosticEvent`] is the unit of record. Call arguments are modelled as a
//! closed set of shapes ([`ArgValue`]) so stringification is explicit and every
//! shape has a fallback instead of relying on implicit coercion.

use consolecap_common::{Level, CLEAR_MARKER_MESSAGE};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Timestamp;

/// One frame of a captured call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteFrame {
    /// Function name, or the anonymous placeholder
    pub function: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for CallSiteFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {} ({}:{}:{})", self.function, self.file, self.line, self.column)
    }
}

/// A captured diagnostic call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub level: Level,
    pub message: String,
    pub timestamp: Timestamp,
    /// Page location active when the event was captured
    pub origin: String,
    #[serde(default, rename = "callSite", skip_serializing_if = "Option::is_none")]
    pub call_site: Option<Vec<CallSiteFrame>>,
}

impl DiagnosticEvent {
    #[must_use]
    pub fn new(
        level: Level,
        message: impl Into<String>,
        timestamp: Timestamp,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp,
            origin: origin.into(),
            call_site: None,
        }
    }

    /// Build an event from raw call arguments using in-page stringification
    #[must_use]
    pub fn from_args(
        level: Level,
        args: &[ArgValue],
        timestamp: Timestamp,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(level, stringify_args(args), timestamp, origin)
    }

    /// Synthetic informational event recorded in place of a console clear
    #[must_use]
    pub fn clear_marker(timestamp: Timestamp, origin: impl Into<String>) -> Self {
        Self::new(Level::Info, CLEAR_MARKER_MESSAGE, timestamp, origin)
    }

    /// Attach a call site; an empty trace is stored as absent
    #[must_use]
    pub fn with_call_site(mut self, frames: Vec<CallSiteFrame>) -> Self {
        self.call_site = if frames.is_empty() { None } else { Some(frames) };
        self
    }

    /// Number of recorded call-site frames (0 when absent)
    #[must_use]
    pub fn call_site_len(&self) -> usize {
        self.call_site.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.timestamp, self.level, self.message)
    }
}

/// A primitive argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// One property of an object preview, already rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPreview {
    pub name: String,
    pub value: String,
}

/// Shape of a diagnostic call argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Primitive(Primitive),
    /// A value with a full structural representation
    Structured(serde_json::Value),
    /// An object that cannot be serialized in-page (cyclic, host object, ...).
    /// Only a privileged observer gets to see the preview.
    Opaque { class_name: String, preview: Vec<PropertyPreview> },
    /// Anything else; carries a type tag only
    Unknown(String),
}

impl ArgValue {
    /// In-page stringification with an explicit fallback per shape
    #[must_use]
    pub fn stringify(&self) -> String {
        match self {
            ArgValue::Primitive(p) => stringify_primitive(p),
            ArgValue::Structured(value) => {
                serde_json::to_string(value).unwrap_or_else(|_| "[object Object]".to_string())
            }
            ArgValue::Opaque { class_name, .. } => format!("[object {class_name}]"),
            ArgValue::Unknown(tag) => format!("[{tag}]"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Primitive(Primitive::String(s.to_string()))
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Primitive(Primitive::String(s))
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Primitive(Primitive::Number(n))
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Primitive(Primitive::Bool(b))
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        ArgValue::Structured(value)
    }
}

/// Join the stringified arguments of one call with single spaces
#[must_use]
pub fn stringify_args(args: &[ArgValue]) -> String {
    args.iter().map(ArgValue::stringify).collect::<Vec<_>>().join(" ")
}

fn stringify_primitive(p: &Primitive) -> String {
    match p {
        Primitive::Undefined => "undefined".to_string(),
        Primitive::Null => "null".to_string(),
        Primitive::Bool(b) => b.to_string(),
        Primitive::Number(n) => format_number(*n),
        Primitive::String(s) => s.clone(),
    }
}

/// Render a number the way the host prints it: integral values without a
/// fractional part, non-finite values by name.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
