//! Priority predicates for merge tie-breaks
//!
//! A duplicate from the second source normally loses to the entry already
//! kept. A candidate the predicate marks as high-value wins over one that is
//! not, which lets embedders keep their own application's messages intact.

use crate::event_data::DiagnosticEvent;

/// Marks events that should win duplicate resolution
pub trait PriorityPredicate: Send + Sync {
    fn is_high_value(&self, event: &DiagnosticEvent) -> bool;
}

/// No event is high-value; call-site length alone decides
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPriority;

impl PriorityPredicate for NoPriority {
    fn is_high_value(&self, _event: &DiagnosticEvent) -> bool {
        false
    }
}

/// High-value when the message contains any of the given tokens
#[derive(Debug, Default, Clone)]
pub struct MarkerTokens {
    tokens: Vec<String>,
}

impl MarkerTokens {
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tokens: tokens.into_iter().map(Into::into).filter(|t: &String| !t.is_empty()).collect() }
    }
}

impl PriorityPredicate for MarkerTokens {
    fn is_high_value(&self, event: &DiagnosticEvent) -> bool {
        self.tokens.iter().any(|t| event.message.contains(t.as_str()))
    }
}

impl<F> PriorityPredicate for F
where
    F: Fn(&DiagnosticEvent) -> bool + Send + Sync,
{
    fn is_high_value(&self, event: &DiagnosticEvent) -> bool {
        self(event)
    }
}
