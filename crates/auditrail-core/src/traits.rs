//! Collaborator traits driven by the `AuditLogger`.
//!
//! These define the seams of the pipeline:
//!
//! - `HashEngine`: digests an event's canonical form into the chain
//! - `EntrySigner`: optional keyed signature over each hash
//! - `EventPolicy`: redaction, privacy, and keep/drop filtering
//! - `EventProcessor`: caller-supplied last stage that may drop or rewrite details
//! - `Destination`: a sink that receives flushed batches
//! - `AuditStorage`: the append-only store queried and verified later
//!
//! The logger wires them together in a fixed order; none of them is
//! mutated after construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use auditrail_contracts::{
    config::HashMode,
    error::AuditResult,
    event::{AuditEvent, Details, EventId},
    query::QueryFilter,
};

/// Digest function for the hash chain.
///
/// Implementations must be pure: identical input always yields identical
/// output, so any party can re-verify a stored chain.
pub trait HashEngine: Send + Sync {
    /// Which digest this engine computes; surfaced in verification reports.
    fn mode(&self) -> HashMode;

    /// Lowercase hex digest of `input`.
    fn digest(&self, input: &[u8]) -> String;

    /// Hash of `event`'s canonical form followed by `prev_hash`.
    ///
    /// The event's own `hash` and `signature` fields never contribute.
    fn hash_event(&self, event: &AuditEvent, prev_hash: &str) -> AuditResult<String> {
        let mut input = event.canonical_bytes()?;
        input.extend_from_slice(prev_hash.as_bytes());
        Ok(self.digest(&input))
    }
}

/// Keyed signature over an event hash.
pub trait EntrySigner: Send + Sync {
    fn sign(&self, hash: &str) -> String;

    /// Constant-time check of `signature` against `hash`.
    fn verify(&self, hash: &str, signature: &str) -> bool;
}

/// The data-protection and filtering gate applied to every built event.
pub trait EventPolicy: Send + Sync {
    /// Apply redaction and privacy rules.  Runs before filtering and hashing.
    fn sanitize(&self, event: AuditEvent) -> AuditEvent;

    /// Redact a `details` map on its own, used after a processor rewrites it.
    fn redact_details(&self, details: Details) -> Details;

    /// Redact a value that belongs to the setting `key` but is stored under
    /// another detail key (e.g. `oldValue` for a change to `apiKey`).
    fn redact_value(&self, key: &str, value: Value) -> Value;

    /// Return false to drop the event (excluded type, not allow-listed, or
    /// below the minimum severity).
    fn admits(&self, event: &AuditEvent) -> bool;
}

/// What an `EventProcessor` decided for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorVerdict {
    /// Record the event unchanged.
    Keep,
    /// Record the event with these details instead.
    Replace(Details),
    /// Do not record the event; same as a filter drop.
    Drop,
}

/// Caller-supplied final stage of the filter chain.
///
/// A processor sees the sanitized event and can only veto it or swap its
/// `details`; type, category, identity, and chain fields are out of reach.
/// Replacement details are redacted again before hashing.
pub trait EventProcessor: Send + Sync {
    fn process(&self, event: &AuditEvent) -> ProcessorVerdict;
}

/// Blanket impl so plain closures can act as processors.
impl<F> EventProcessor for F
where
    F: Fn(&AuditEvent) -> ProcessorVerdict + Send + Sync,
{
    fn process(&self, event: &AuditEvent) -> ProcessorVerdict {
        self(event)
    }
}

/// A delivery target for flushed batches.
///
/// Each destination is invoked independently and bounded by the logger's
/// per-destination timeout; an error or timeout is recorded in the
/// `FlushReport` and never affects other destinations.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable name used in reports and logs.
    fn name(&self) -> &str;

    /// Per-destination predicate, applied after the global filters.
    fn accepts(&self, _event: &AuditEvent) -> bool {
        true
    }

    /// Deliver `batch`, already narrowed by `accepts`, in chain order.
    async fn deliver(&self, batch: &[AuditEvent]) -> AuditResult<()>;

    /// Release resources.  Called once when the logger closes.
    async fn close(&self) -> AuditResult<()> {
        Ok(())
    }
}

/// Append-only event store behind `query`, `get`, `count`, and verification.
///
/// Implementations must be thread-safe and keep events in insertion order.
pub trait AuditStorage: Send + Sync {
    /// Append a batch, preserving its order.
    fn write_batch(&self, events: &[AuditEvent]) -> AuditResult<()>;

    /// Append a single event.
    fn write(&self, event: &AuditEvent) -> AuditResult<()> {
        self.write_batch(std::slice::from_ref(event))
    }

    /// Matching events, ordered and paginated per `filter`.
    fn query(&self, filter: &QueryFilter) -> AuditResult<Vec<AuditEvent>>;

    fn get(&self, id: &EventId) -> AuditResult<Option<AuditEvent>>;

    /// Matching events, ignoring pagination.
    fn count(&self, filter: &QueryFilter) -> AuditResult<usize>;

    /// Every stored event in insertion order.
    fn all(&self) -> AuditResult<Vec<AuditEvent>>;

    /// `hash` of the newest stored event, used to resume a chain.
    fn tail_hash(&self) -> AuditResult<Option<String>>;

    /// The `prev_hash` the oldest surviving event is expected to carry.
    ///
    /// Empty until eviction or cleanup removes the head of the chain.
    fn anchor(&self) -> AuditResult<String>;

    /// Remove the oldest events, up to the first with `timestamp >= cutoff`;
    /// returns how many.
    ///
    /// Only a prefix of the chain is ever removed, so the survivors stay
    /// contiguous.  They are never rehashed; the anchor moves instead.
    fn cleanup(&self, cutoff: DateTime<Utc>) -> AuditResult<usize>;

    /// Push pending writes to durable media.
    fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}
