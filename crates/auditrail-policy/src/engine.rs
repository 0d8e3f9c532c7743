//! Configuration-driven `EventPolicy`.
//!
//! `ConfigPolicy` combines the three data-protection stages in their fixed
//! order:
//!
//! 1. GDPR privacy (`PrivacyGuard`) on actor, target and user-id details
//! 2. field redaction (`Redactor`) on `details`
//! 3. keep/drop rules (`FilterChain`)
//!
//! The logger calls `sanitize` before `admits`, so a filter never sees a
//! value that redaction would have removed.

use serde_json::Value;
use tracing::debug;

use auditrail_contracts::{
    config::AuditConfig,
    event::{AuditEvent, Details},
};
use auditrail_core::traits::EventPolicy;

use crate::{filter::FilterChain, privacy::PrivacyGuard, redact::Redactor};

/// An `EventPolicy` built from an `AuditConfig`.
///
/// ```rust,ignore
/// let config = auditrail_policy::config::load_config_file(Path::new("audit.toml"))?;
/// let policy = ConfigPolicy::from_config(&config);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigPolicy {
    privacy: PrivacyGuard,
    redactor: Redactor,
    filters: FilterChain,
}

impl ConfigPolicy {
    pub fn new(privacy: PrivacyGuard, redactor: Redactor, filters: FilterChain) -> Self {
        Self {
            privacy,
            redactor,
            filters,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(
            PrivacyGuard::from_config(config),
            Redactor::from_config(config),
            FilterChain::from_config(config),
        )
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }
}

impl EventPolicy for ConfigPolicy {
    fn sanitize(&self, event: AuditEvent) -> AuditEvent {
        let mut event = self.privacy.apply(event);
        event.details = self.redactor.redact(event.details);
        event
    }

    /// Privacy and redaction for a replacement `details` map.
    fn redact_details(&self, details: Details) -> Details {
        self.redactor.redact(self.privacy.apply_details(details))
    }

    fn redact_value(&self, key: &str, value: Value) -> Value {
        self.redactor.redact_value(key, value)
    }

    fn admits(&self, event: &AuditEvent) -> bool {
        match self.filters.check(event) {
            None => true,
            Some(reason) => {
                debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "event filtered out"
                );
                false
            }
        }
    }
}
