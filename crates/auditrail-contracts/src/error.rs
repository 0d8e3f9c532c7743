//! Error types for the auditrail pipeline.
//!
//! All fallible operations return `AuditResult<T>`.  Delivery failures and
//! integrity findings are *not* errors: they are reported as data in
//! `FlushReport` and `VerificationReport`.

use thiserror::Error;

/// The unified error type for auditrail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A configuration value is missing, malformed, or contradictory.
    ///
    /// Raised at construction time; a logger is never built from an invalid
    /// configuration.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The caller named an event type outside the closed enumeration.
    #[error("unknown event type '{name}'")]
    UnknownEventType { name: String },

    /// The storage backend could not read or persist events.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// An event could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A destination rejected a batch.
    #[error("delivery to '{destination}' failed: {reason}")]
    Delivery { destination: String, reason: String },

    /// A destination did not finish within its time budget.
    #[error("delivery to '{destination}' timed out after {after_ms} ms")]
    Timeout { destination: String, after_ms: u64 },

    /// The logger's internal state mutex was poisoned by a panicking thread.
    #[error("audit state lock poisoned: {reason}")]
    StatePoisoned { reason: String },

    /// The logger was closed; no further events are accepted.
    #[error("audit logger is closed")]
    Closed,
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the auditrail crates.
pub type AuditResult<T> = Result<T, AuditError>;
