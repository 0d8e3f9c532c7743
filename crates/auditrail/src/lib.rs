//! # auditrail
//!
//! Tamper-evident, hash-chained audit trail.
//!
//! This crate assembles the component crates from one `AuditConfig`:
//!
//! - `auditrail-contracts`: events, configuration, query and report types
//! - `auditrail-core`: the `AuditLogger` pipeline and the integrity verifier
//! - `auditrail-chain`: hash engines, signing, storage backends
//! - `auditrail-policy`: redaction, GDPR privacy, filters, TOML loading
//! - `auditrail-sinks`: file, console and callback destinations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditrail::{AuditTrailBuilder, EventType, LogOptions, QueryFilter};
//!
//! let config = auditrail::load_config_file(Path::new("audit.toml"))?;
//! let logger = AuditTrailBuilder::new(config).build()?;
//!
//! logger.log(EventType::ToolCall, LogOptions::new().trace("t1")).await?;
//! logger.flush().await?;
//! let events = logger.query(&QueryFilter::new().trace("t1"))?;
//! assert!(logger.verify_integrity(None)?.valid);
//! logger.close().await?;
//! ```

pub mod setup;

pub use setup::{build_destinations, open_storage, AuditTrailBuilder};

pub use auditrail_chain::{
    engine_for, ChecksumHashEngine, HmacSigner, InMemoryAuditStorage, JsonlAuditStorage,
    Sha256HashEngine,
};
pub use auditrail_contracts::{
    AuditConfig, AuditError, AuditEvent, AuditResult, Actor, ActorKind, DeliveryFailure,
    DestinationConfig, DestinationFilter, Details, EventCategory, EventId, EventType, FlushReport,
    HashMode, Outcome, QueryFilter, RotationConfig, Severity, SortOrder, StorageConfig, Target,
    VerificationReport,
};
pub use auditrail_core::{
    verify_chain, AuditLogger, AuditStorage, Destination, ErrorInfo, EventProcessor, LogOptions,
    ProcessorVerdict, SecurityEvent, SecurityKind, TokenUsage,
};
pub use auditrail_policy::config::{load_config_file, load_config_str};
pub use auditrail_policy::{ConfigPolicy, REDACTED};
pub use auditrail_sinks::{CallbackDestination, ConsoleDestination, FileDestination};

// ── Tests ─────────────────────────────────────────────────────────────────────
