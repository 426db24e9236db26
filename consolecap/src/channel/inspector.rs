//! Buffered inspection backend
//!
//! Plays the host runtime's side of the privileged channel: it keeps a bounded
//! backlog of console notifications for every open execution context, whether
//! or not anyone is attached, and exposes that backlog only while attached.
//! This is what lets the channel see calls made before the in-page wrappers
//! were installed.

use async_trait::async_trait;
use consolecap_common::STORE_CAPACITY;
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::protocol::{ConsoleApiCalled, ProtocolMessage};
use crate::domain::{ChannelError, ContextId, PageInfo};
use crate::event_data::DiagnosticEvent;

/// Host-runtime side of the privileged inspection channel
#[async_trait]
pub trait InspectionBackend: Send + Sync {
    /// Enable the channel for a context
    async fn attach(&self, context: ContextId) -> Result<(), ChannelError>;

    /// Events currently buffered for an attached context
    async fn events(&self, context: ContextId) -> Result<Vec<DiagnosticEvent>, ChannelError>;

    /// Release the channel for a context
    async fn detach(&self, context: ContextId) -> Result<(), ChannelError>;
}

#[derive(Debug)]
struct ContextBuffer {
    origin: String,
    attached: bool,
    events: VecDeque<DiagnosticEvent>,
}

/// In-process inspection backend fed with protocol notifications
#[derive(Debug)]
pub struct BufferedInspector {
    contexts: Mutex<HashMap<ContextId, ContextBuffer>>,
    capacity: usize,
}

impl Default for BufferedInspector {
    fn default() -> Self {
        Self::with_capacity(STORE_CAPACITY)
    }
}

impl BufferedInspector {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { contexts: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
    }

    /// Host opened an execution context for `page`
    pub fn open_context(&self, page: &PageInfo) {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner).insert(
            page.context,
            ContextBuffer { origin: page.url.clone(), attached: false, events: VecDeque::new() },
        );
    }

    /// Host destroyed an execution context; its backlog is gone
    pub fn close_context(&self, context: ContextId) {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner).remove(&context);
    }

    #[must_use]
    pub fn is_attached(&self, context: ContextId) -> bool {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&context)
            .is_some_and(|c| c.attached)
    }

    /// Buffer one console notification.
    ///
    /// # Errors
    /// Returns [`ChannelError::ContextClosed`] for an unknown context
    pub fn ingest(&self, call: &ConsoleApiCalled) -> Result<(), ChannelError> {
        let context = call.context();
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = contexts.get_mut(&context).ok_or(ChannelError::ContextClosed(context))?;

        buffer.events.push_back(call.to_event(&buffer.origin));
        while buffer.events.len() > self.capacity {
            buffer.events.pop_front();
        }
        Ok(())
    }

    /// Parse and buffer one raw protocol message.
    ///
    /// Returns `false` for messages that are not console notifications.
    ///
    /// # Errors
    /// Returns [`ChannelError::MalformedMessage`] or [`ChannelError::ContextClosed`]
    pub fn ingest_json(&self, raw: &str) -> Result<bool, ChannelError> {
        let message = ProtocolMessage::parse(raw)?;
        match message.console_call()? {
            Some(call) => {
                self.ingest(&call)?;
                Ok(true)
            }
            None => {
                debug!("Ignoring protocol message {}", message.method);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl InspectionBackend for BufferedInspector {
    async fn attach(&self, context: ContextId) -> Result<(), ChannelError> {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = contexts.get_mut(&context).ok_or(ChannelError::ContextClosed(context))?;
        if buffer.attached {
            return Err(ChannelError::AlreadyAttached(context));
        }
        buffer.attached = true;
        Ok(())
    }

    async fn events(&self, context: ContextId) -> Result<Vec<DiagnosticEvent>, ChannelError> {
        let contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = contexts.get(&context).ok_or(ChannelError::ContextClosed(context))?;
        if !buffer.attached {
            return Err(ChannelError::NotAttached(context));
        }
        Ok(buffer.events.iter().cloned().collect())
    }

    async fn detach(&self, context: ContextId) -> Result<(), ChannelError> {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = contexts.get_mut(&context).ok_or(ChannelError::ContextClosed(context))?;
        if !buffer.attached {
            return Err(ChannelError::NotAttached(context));
        }
        buffer.attached = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_message(context: u64, timestamp: f64, text: &str) -> String {
        serde_json::json!({
            "method": "Runtime.consoleAPICalled",
            "params": {
                "type": "log",
                "executionContextId": context,
                "timestamp": timestamp,
                "args": [{"type": "string", "value": text}]
            }
        })
        .to_string()
    }

    fn page() -> PageInfo {
        PageInfo::new(ContextId(1), "https://app.test/", "App")
    }

    #[tokio::test]
    async fn test_backlog_visible_only_while_attached() {
        let inspector = BufferedInspector::default();
        inspector.open_context(&page());
        assert!(inspector.ingest_json(&log_message(1, 10.0, "early")).unwrap());

        assert_eq!(inspector.events(ContextId(1)).await, Err(ChannelError::NotAttached(ContextId(1))));
        inspector.attach(ContextId(1)).await.unwrap();

        let events = inspector.events(ContextId(1)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "early");
        assert_eq!(events[0].origin, "https://app.test/");
    }

    #[tokio::test]
    async fn test_attach_twice_reports_already_attached() {
        let inspector = BufferedInspector::default();
        inspector.open_context(&page());
        inspector.attach(ContextId(1)).await.unwrap();
        assert_eq!(inspector.attach(ContextId(1)).await, Err(ChannelError::AlreadyAttached(ContextId(1))));
    }

    #[tokio::test]
    async fn test_closed_context_rejects_everything() {
        let inspector = BufferedInspector::default();
        inspector.open_context(&page());
        inspector.close_context(ContextId(1));

        assert_eq!(inspector.attach(ContextId(1)).await, Err(ChannelError::ContextClosed(ContextId(1))));
        assert!(matches!(
            inspector.ingest_json(&log_message(1, 1.0, "late")),
            Err(ChannelError::ContextClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_backlog_bounded_fifo() {
        let inspector = BufferedInspector::with_capacity(2);
        inspector.open_context(&page());
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            inspector.ingest_json(&log_message(1, i as f64, text)).unwrap();
        }
        inspector.attach(ContextId(1)).await.unwrap();

        let messages: Vec<String> =
            inspector.events(ContextId(1)).await.unwrap().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_non_console_messages_skipped() {
        let inspector = BufferedInspector::default();
        let ingested = inspector.ingest_json(r#"{"method": "Network.requestWillBeSent"}"#).unwrap();
        assert!(!ingested);
    }
}
