//! Query filters and the structured results of flush and verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HashMode;
use crate::event::{AuditEvent, EventCategory, EventType, Outcome};

/// Page size applied when a query sets no `limit`.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Ordering of query results by timestamp.
///
/// Ties keep storage insertion order (reversed for `Descending`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Criteria for `query` and `count`.  Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    /// Inclusive lower bound on `timestamp`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`.
    pub to: Option<DateTime<Utc>>,
    pub types: Option<Vec<EventType>>,
    pub categories: Option<Vec<EventCategory>>,
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    pub outcome: Option<Outcome>,
    pub trace_id: Option<String>,
    /// `DEFAULT_QUERY_LIMIT` when unset.  Ignored by `count`.
    pub limit: Option<usize>,
    /// Ignored by `count`.
    pub offset: usize,
    pub order: SortOrder,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    pub fn categories(mut self, categories: impl IntoIterator<Item = EventCategory>) -> Self {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_QUERY_LIMIT)
    }

    /// True when `event` satisfies every criterion except pagination.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if self.from.is_some_and(|from| event.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.timestamp > to) {
            return false;
        }
        if let Some(types) = &self.types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&event.category) {
                return false;
            }
        }
        if let Some(actor_id) = &self.actor_id {
            if event.actor_id() != Some(actor_id.as_str()) {
                return false;
            }
        }
        if let Some(target_id) = &self.target_id {
            if event.target_id() != Some(target_id.as_str()) {
                return false;
            }
        }
        if self.outcome.is_some_and(|o| o != event.outcome) {
            return false;
        }
        if let Some(trace_id) = &self.trace_id {
            if event.trace_id.as_deref() != Some(trace_id.as_str()) {
                return false;
            }
        }
        true
    }

    /// Filter, order and paginate events given in insertion order.
    pub fn apply<'a, I>(&self, events: I) -> Vec<AuditEvent>
    where
        I: IntoIterator<Item = &'a AuditEvent>,
    {
        let mut matched: Vec<&AuditEvent> = events.into_iter().filter(|e| self.matches(e)).collect();

        // Stable sort keeps insertion order among equal timestamps.
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if self.order == SortOrder::Descending {
            matched.reverse();
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.effective_limit())
            .cloned()
            .collect()
    }

    /// Number of events satisfying the criteria, ignoring pagination.
    pub fn count<'a, I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = &'a AuditEvent>,
    {
        events.into_iter().filter(|e| self.matches(e)).count()
    }
}

// ── Flush results ─────────────────────────────────────────────────────────────

/// Name under which storage failures appear in a `FlushReport`.
pub const STORAGE_DESTINATION: &str = "storage";

/// One destination that could not take a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub destination: String,
    pub reason: String,
    /// Events that were meant for this destination.
    pub events: usize,
}

/// Outcome of a single flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Events drained from the buffer.
    pub flushed: usize,
    /// `(destination, events delivered)` for each successful delivery.
    pub delivered: Vec<(String, usize)>,
    pub failures: Vec<DeliveryFailure>,
}

impl FlushReport {
    /// True when every destination and the storage accepted the batch.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ── Verification results ──────────────────────────────────────────────────────

/// Result of walking a sequence of events and re-deriving their hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Digest that produced (and re-verified) the chain.
    pub mode: HashMode,
    /// False for the checksum fallback and for disabled chains.
    pub cryptographic: bool,
    /// Events examined.
    pub checked: usize,
}
