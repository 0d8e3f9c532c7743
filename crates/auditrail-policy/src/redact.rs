//! Field redaction for `details`.
//!
//! Matching is exact and case-sensitive on top-level keys only; nested
//! objects are left alone.  Redaction runs before hashing, so the chain
//! attests to the persisted (redacted) form.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use auditrail_contracts::{config::AuditConfig, event::Details};

/// Placeholder written over redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Replaces the values of configured keys with `REDACTED`.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    fields: HashSet<String>,
}

impl Redactor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// `redact_fields` when `hash_sensitive_data` is on, otherwise nothing.
    pub fn from_config(config: &AuditConfig) -> Self {
        if config.hash_sensitive_data {
            Self::new(config.redact_fields.iter().cloned())
        } else {
            Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.fields.contains(key)
    }

    /// `value` as stored for the setting `key`: `REDACTED` when `key` is
    /// sensitive.
    pub fn redact_value(&self, key: &str, value: Value) -> Value {
        if self.is_sensitive(key) {
            debug!(key, "sensitive setting value redacted");
            Value::String(REDACTED.to_string())
        } else {
            value
        }
    }

    pub fn redact(&self, mut details: Details) -> Details {
        let mut redacted = 0;
        for (key, value) in details.iter_mut() {
            if self.fields.contains(key) {
                *value = Value::String(REDACTED.to_string());
                redacted += 1;
            }
        }
        if redacted > 0 {
            debug!(redacted, "sensitive detail fields redacted");
        }
        details
    }
}
