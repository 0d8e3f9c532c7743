//! # auditrail-core
//!
//! The buffered, hash-chained audit logger.
//!
//! This crate provides:
//! - The collaborator traits (`HashEngine`, `EntrySigner`, `EventPolicy`,
//!   `EventProcessor`, `Destination`, `AuditStorage`)
//! - `EventBuilder` and `LogOptions` for assembling events
//! - `AuditLogger`, which sanitizes, filters, chains, buffers and flushes
//! - `verify_chain`, the integrity verifier
//!
//! Concrete hash engines and storage live in `auditrail-chain`, redaction
//! and filtering in `auditrail-policy`, destinations in `auditrail-sinks`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditrail_core::{AuditLogger, LogOptions};
//!
//! logger.log(EventType::ToolCall, LogOptions::new().trace("t1")).await?;
//! let report = logger.flush().await?;
//! assert!(logger.verify_integrity(None)?.valid);
//! ```

pub mod builder;
pub mod convenience;
pub mod dispatch;
pub mod integrity;
pub mod logger;
pub mod traits;

pub use builder::{EventBuilder, LogOptions};
pub use convenience::{ErrorInfo, SecurityEvent, SecurityKind, TokenUsage};
pub use dispatch::Dispatcher;
pub use integrity::verify_chain;
pub use logger::{AuditLogger, AuditLoggerBuilder};
pub use traits::{
    AuditStorage, Destination, EntrySigner, EventPolicy, EventProcessor, HashEngine,
    ProcessorVerdict,
};

// ── Tests ─────────────────────────────────────────────────────────────────────
