//! The configured keep/drop rules.
//!
//! Checked in order, first match drops:
//!
//! 1. the type is listed in `exclude_events`
//! 2. an `events` allow-list exists and the type is not on it
//! 3. the event's severity is below `min_severity`
//!
//! Severity is read from `details.severity`; events without one count as
//! `low`, so a minimum above `low` also drops ordinary non-security events.

use std::collections::HashSet;
use std::fmt;

use auditrail_contracts::{
    config::AuditConfig,
    event::{AuditEvent, EventType, Severity},
};

/// Why `FilterChain` dropped an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Excluded,
    NotAllowed,
    BelowSeverity { severity: Severity, minimum: Severity },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excluded => f.write_str("type is excluded"),
            Self::NotAllowed => f.write_str("type is not in the events allow-list"),
            Self::BelowSeverity { severity, minimum } => write!(
                f,
                "severity '{}' is below minimum '{}'",
                severity.as_str(),
                minimum.as_str()
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    excluded: HashSet<EventType>,
    allowed: Option<HashSet<EventType>>,
    min_severity: Option<Severity>,
}

impl FilterChain {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            excluded: config.exclude_events.iter().copied().collect(),
            allowed: config
                .events
                .as_ref()
                .map(|events| events.iter().copied().collect()),
            min_severity: config.min_severity,
        }
    }

    pub fn exclude(mut self, event_type: EventType) -> Self {
        self.excluded.insert(event_type);
        self
    }

    pub fn allow_only(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.allowed = Some(types.into_iter().collect());
        self
    }

    pub fn min_severity(mut self, minimum: Severity) -> Self {
        self.min_severity = Some(minimum);
        self
    }

    /// The first rule that drops `event`, or `None` to keep it.
    pub fn check(&self, event: &AuditEvent) -> Option<DropReason> {
        if self.excluded.contains(&event.event_type) {
            return Some(DropReason::Excluded);
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(&event.event_type) {
                return Some(DropReason::NotAllowed);
            }
        }
        if let Some(minimum) = self.min_severity {
            let severity = event.effective_severity();
            if severity < minimum {
                return Some(DropReason::BelowSeverity { severity, minimum });
            }
        }
        None
    }
}
