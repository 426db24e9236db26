//! Call-site extraction for intercepted calls
//!
//! The stack is only meaningful while the wrapper is still on it, so
//! [`CallSiteExtractor::capture`] must run inside the wrapper before the call is
//! forwarded. Missing stack information yields an empty trace; that is a
//! degraded but valid result, never an error.

use consolecap_common::{ANONYMOUS_FUNCTION, CALL_SITE_SKIP_FRAMES, MAX_CALL_SITE_FRAMES};
use log::debug;
use std::sync::Arc;

use crate::event_data::CallSiteFrame;

/// One unresolved-or-partially-resolved stack frame, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl RawFrame {
    #[must_use]
    pub fn new(function: &str, file: &str, line: u32, column: u32) -> Self {
        Self {
            function: Some(function.to_string()),
            file: Some(file.to_string()),
            line: Some(line),
            column: Some(column),
        }
    }

    fn into_call_site(self) -> CallSiteFrame {
        CallSiteFrame {
            function: self
                .function
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| ANONYMOUS_FUNCTION.to_string()),
            file: self.file.unwrap_or_else(|| "<unknown>".to_string()),
            line: self.line.unwrap_or(0),
            column: self.column.unwrap_or(0),
        }
    }
}

/// Where call stacks come from
///
/// The native implementation walks the current thread's stack; embedders that
/// run a scripting runtime supply the script-level stack instead.
pub trait StackSource: Send + Sync {
    /// Frames of the current call stack, innermost first
    fn frames(&self) -> Vec<RawFrame>;
}

/// Walks the current thread's native stack with the `backtrace` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStack;

impl StackSource for NativeStack {
    fn frames(&self) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        backtrace::trace(|frame| {
            let mut resolved = None;
            backtrace::resolve_frame(frame, |symbol| {
                if resolved.is_none() {
                    resolved = Some(RawFrame {
                        function: symbol.name().map(|n| format!("{n:#}")),
                        file: symbol.filename().map(|p| p.display().to_string()),
                        line: symbol.lineno(),
                        column: symbol.colno(),
                    });
                }
            });
            frames.push(resolved.unwrap_or_default());
            true
        });
        frames
    }
}

/// A fixed stack, for embedders that already know the call site
#[derive(Debug, Default, Clone)]
pub struct StaticStack(pub Vec<RawFrame>);

impl StackSource for StaticStack {
    fn frames(&self) -> Vec<RawFrame> {
        self.0.clone()
    }
}

/// Derives a bounded call-site trace for each captured call
#[derive(Clone)]
pub struct CallSiteExtractor {
    source: Arc<dyn StackSource>,
    skip: usize,
    max_frames: usize,
}

impl std::fmt::Debug for CallSiteExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSiteExtractor")
            .field("skip", &self.skip)
            .field("max_frames", &self.max_frames)
            .finish_non_exhaustive()
    }
}

impl Default for CallSiteExtractor {
    fn default() -> Self {
        Self::new(Arc::new(NativeStack))
    }
}

impl CallSiteExtractor {
    #[must_use]
    pub fn new(source: Arc<dyn StackSource>) -> Self {
        Self { source, skip: CALL_SITE_SKIP_FRAMES, max_frames: MAX_CALL_SITE_FRAMES }
    }

    #[must_use]
    pub fn with_limits(mut self, skip: usize, max_frames: usize) -> Self {
        self.skip = skip;
        self.max_frames = max_frames;
        self
    }

    /// Capture the current call site: drop the stack walker's own frames,
    /// skip the wrapper frames, keep at most `max_frames`.
    #[must_use]
    pub fn capture(&self) -> Vec<CallSiteFrame> {
        let frames = self.source.frames();
        if frames.is_empty() {
            debug!("No stack information available, recording empty call site");
            return Vec::new();
        }

        frames
            .into_iter()
            .skip_while(is_extractor_frame)
            .skip(self.skip)
            .take(self.max_frames)
            .map(RawFrame::into_call_site)
            .collect()
    }
}

/// Frames belonging to the stack walker or to this module
fn is_extractor_frame(frame: &RawFrame) -> bool {
    frame.function.as_deref().is_some_and(|f| {
        f.starts_with("backtrace::") || f.contains("::capture::call_site::")
    })
}
