//! Tracked error inputs and the ephemeral per-occurrence record.
//!
//! [`TrackedError`] is the caller-facing input shape: an error type name, a
//! message, and optional backtrace text. It can be derived from any
//! [`std::error::Error`] or built directly for synthetic errors where the
//! caller only has a string description. [`ErrorRecord`] is the internal
//! record produced per tracked occurrence; it lives in the aggregator's
//! buffer until the next flush.

use crate::core::context::ContextMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on a stored raw error message, in characters
pub(crate) const MAX_MESSAGE_LEN: usize = 2000;
/// Upper bound on stored traceback text, in characters
pub(crate) const MAX_TRACEBACK_LEN: usize = 10_000;

/// An error being handed to the tracker.
#[derive(Debug, Clone)]
pub struct TrackedError {
    /// Short type name of the error (e.g. `"DbErr"`)
    pub error_type: String,
    /// The error's message text
    pub message: String,
    /// Formatted backtrace text, if one was captured
    pub backtrace: Option<String>,
}

impl TrackedError {
    /// Creates a tracked error from an explicit type name and message.
    ///
    /// Use this when the caller has a string description rather than a live
    /// error value.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            backtrace: None,
        }
    }

    /// Derives the type name and message from any [`std::error::Error`].
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        Self {
            error_type: short_type_name(std::any::type_name::<E>()).to_string(),
            message: error.to_string(),
            backtrace: None,
        }
    }

    /// Like [`Self::from_error`], additionally capturing the current backtrace.
    ///
    /// Frame locations make a much stronger root-cause signal than message
    /// text, so callers on a known error path should prefer this constructor.
    pub fn from_error_with_backtrace<E: std::error::Error>(error: &E) -> Self {
        Self::from_error(error)
            .with_backtrace(std::backtrace::Backtrace::force_capture().to_string())
    }

    /// Attaches pre-captured backtrace text.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }
}

/// Strips module path segments and generic parameters from a full type name.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Truncates to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// One tracked error occurrence, buffered in memory until the next flush.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Unique token identifying this specific occurrence
    pub id: String,
    /// When the occurrence was tracked
    pub timestamp: DateTime<Utc>,
    /// Category tag, explicit or pattern-inferred
    pub category: String,
    /// Short type name of the originating error
    pub error_type: String,
    /// Raw message, truncated to a bounded length
    pub error_message: String,
    /// Stable hash of the error's root pattern
    pub fingerprint: String,
    /// Placeholder-substituted message retained for display and grouping
    pub normalized_message: String,
    /// Sanitized caller-supplied context
    pub context: ContextMap,
    /// Formatted traceback text, capped in length; empty when none was given
    pub traceback: String,
}

impl ErrorRecord {
    /// The compact entry pushed onto an aggregate's `recent_occurrences` list.
    pub fn occurrence(&self) -> OccurrenceEntry {
        OccurrenceEntry {
            timestamp: self.timestamp,
            error_id: self.id.clone(),
            context: self.context.clone(),
        }
    }
}

/// Element shape of an aggregate's bounded `recent_occurrences` list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceEntry {
    /// When this occurrence was tracked
    pub timestamp: DateTime<Utc>,
    /// Record id of the occurrence
    pub error_id: String,
    /// Sanitized context captured with the occurrence
    pub context: ContextMap,
}
