//! External channel adapter
//!
//! Optional second observation source. Attaching has a host-visible side
//! effect, so it only happens on explicit request; every failure is logged and
//! swallowed, and the merge simply degrades to the in-page store.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::inspector::InspectionBackend;
use crate::domain::{ChannelError, ContextId};
use crate::event_data::DiagnosticEvent;

pub struct ExternalChannelAdapter<B> {
    backend: Arc<B>,
    attached: Mutex<HashSet<ContextId>>,
}

impl<B: InspectionBackend> ExternalChannelAdapter<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, attached: Mutex::new(HashSet::new()) }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[must_use]
    pub fn is_attached(&self, context: ContextId) -> bool {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner).contains(&context)
    }

    /// Enable the channel for `context`. Idempotent; never fails.
    ///
    /// Returns whether the channel is attached afterwards.
    pub async fn attach(&self, context: ContextId) -> bool {
        if self.is_attached(context) {
            debug!("Inspection channel already attached to {context}");
            return true;
        }

        match self.backend.attach(context).await {
            Ok(()) => {
                info!("Inspection channel attached to {context}");
            }
            Err(ChannelError::AlreadyAttached(_)) => {
                debug!("Inspection channel was already attached to {context} by the host");
            }
            Err(e) => {
                warn!("Inspection channel unavailable: {e}");
                return false;
            }
        }
        self.attached.lock().unwrap_or_else(PoisonError::into_inner).insert(context);
        true
    }

    /// Events buffered for `context`; empty when not attached or on failure
    pub async fn events(&self, context: ContextId) -> Vec<DiagnosticEvent> {
        if !self.is_attached(context) {
            return Vec::new();
        }
        match self.backend.events(context).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to read inspection channel events: {e}");
                Vec::new()
            }
        }
    }

    /// Release the channel for `context`. Idempotent; failures are swallowed.
    pub async fn detach(&self, context: ContextId) {
        let was_attached =
            self.attached.lock().unwrap_or_else(PoisonError::into_inner).remove(&context);
        if let Err(e) = self.backend.detach(context).await {
            debug!("Detach from {context} ignored: {e}");
        } else if was_attached {
            info!("Inspection channel detached from {context}");
        }
    }
}
