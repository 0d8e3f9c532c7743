//! Event construction.
//!
//! `EventBuilder` turns an `EventType` plus caller context (`LogOptions`)
//! into a fully populated, not-yet-hashed `AuditEvent`.  It is pure: it
//! neither redacts, filters, hashes, nor persists.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use auditrail_contracts::event::{
    Actor, AuditEvent, Details, EventId, EventType, Outcome, Severity, Target, SEVERITY_KEY,
};

/// Caller-supplied context for one event.  Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    pub actor: Option<Actor>,
    pub target: Option<Target>,
    pub outcome: Option<Outcome>,
    pub details: Details,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Replace the whole details map.
    pub fn details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    /// Insert one detail.  Values that fail to serialize are stored as `null`.
    pub fn detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.details.insert(key.into(), value);
        self
    }

    pub fn severity(self, severity: Severity) -> Self {
        self.detail(SEVERITY_KEY, severity.as_str())
    }

    pub fn trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn span(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Fill actor, target, and correlation ids from `other` where unset here.
    pub(crate) fn inherit(mut self, other: LogOptions) -> Self {
        if self.actor.is_none() {
            self.actor = other.actor;
        }
        if self.target.is_none() {
            self.target = other.target;
        }
        if self.outcome.is_none() {
            self.outcome = other.outcome;
        }
        if self.trace_id.is_none() {
            self.trace_id = other.trace_id;
        }
        if self.span_id.is_none() {
            self.span_id = other.span_id;
        }
        for (key, value) in other.details {
            self.details.entry(key).or_insert(value);
        }
        self
    }
}

/// Builds events for one service.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    service_name: String,
}

impl EventBuilder {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Assemble an event with a fresh id and timestamp.
    ///
    /// `category` comes from `event_type`; a missing actor becomes the
    /// system actor for this service; a missing outcome is `Success`.
    /// Chain fields are left empty.
    pub fn build(&self, event_type: EventType, options: LogOptions) -> AuditEvent {
        AuditEvent {
            id: EventId::new(),
            timestamp: Utc::now(),
            event_type,
            category: event_type.category(),
            actor: Some(
                options
                    .actor
                    .unwrap_or_else(|| Actor::system(&self.service_name)),
            ),
            target: options.target,
            outcome: options.outcome.unwrap_or_default(),
            details: options.details,
            trace_id: options.trace_id,
            span_id: options.span_id,
            prev_hash: String::new(),
            hash: String::new(),
            signature: None,
        }
    }
}
