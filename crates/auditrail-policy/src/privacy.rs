//! GDPR handling of user identities.
//!
//! Two modes act on the same targets: a `user`-kind actor or target, and
//! any detail key that names a user identifier (`userId`, `user_email`,
//! `Email`, `username`, ...).  `Exclude` removes them outright.
//! `Anonymize` swaps each value for a pseudonym: `anon_` followed by the
//! first 16 hex characters of its SHA-256, stable across runs and not
//! reversible.

use serde_json::Value;
use sha2::{Digest, Sha256};

use auditrail_contracts::{
    config::AuditConfig,
    event::{AuditEvent, Details},
};

const PSEUDONYM_PREFIX: &str = "anon_";
const PSEUDONYM_HEX_LEN: usize = 16;

/// Normalized detail keys treated as user identifiers.
const USER_ID_KEYS: [&str; 4] = ["userid", "useremail", "email", "username"];

/// What happens to user identities in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDataMode {
    #[default]
    Retain,
    Exclude,
    Anonymize,
}

impl UserDataMode {
    /// Exclusion wins over anonymization.
    pub fn from_config(config: &AuditConfig) -> Self {
        if !config.allow_user_data {
            Self::Exclude
        } else if config.anonymize_users || config.gdpr_mode {
            Self::Anonymize
        } else {
            Self::Retain
        }
    }
}

/// Stable one-way pseudonym for `value`.
pub fn pseudonymize(value: &str) -> String {
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    format!("{}{}", PSEUDONYM_PREFIX, &digest[..PSEUDONYM_HEX_LEN])
}

/// True for values `pseudonymize` produced; they are not hashed again.
pub fn is_pseudonym(value: &str) -> bool {
    value
        .strip_prefix(PSEUDONYM_PREFIX)
        .is_some_and(|rest| {
            rest.len() == PSEUDONYM_HEX_LEN
                && rest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}

/// Case-insensitive match ignoring `_` and `-`.
pub fn is_user_id_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    USER_ID_KEYS.contains(&normalized.as_str())
}

fn pseudonymize_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if is_pseudonym(s) => value.clone(),
        Value::String(s) => Value::String(pseudonymize(s)),
        other => Value::String(pseudonymize(&other.to_string())),
    }
}

fn pseudonymize_in_place(value: &mut String) {
    if !is_pseudonym(value) {
        *value = pseudonymize(value);
    }
}

/// Applies a `UserDataMode` to events and detail maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyGuard {
    mode: UserDataMode,
}

impl PrivacyGuard {
    pub fn new(mode: UserDataMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(UserDataMode::from_config(config))
    }

    pub fn mode(&self) -> UserDataMode {
        self.mode
    }

    pub fn apply(&self, mut event: AuditEvent) -> AuditEvent {
        match self.mode {
            UserDataMode::Retain => return event,
            UserDataMode::Exclude => {
                if event.actor.as_ref().is_some_and(|a| a.is_user()) {
                    event.actor = None;
                }
                if event.target.as_ref().is_some_and(|t| t.is_user()) {
                    event.target = None;
                }
            }
            UserDataMode::Anonymize => {
                if let Some(actor) = event.actor.as_mut().filter(|a| a.is_user()) {
                    pseudonymize_in_place(&mut actor.id);
                    if let Some(name) = actor.name.as_mut() {
                        pseudonymize_in_place(name);
                    }
                }
                if let Some(target) = event.target.as_mut().filter(|t| t.is_user()) {
                    pseudonymize_in_place(&mut target.id);
                    if let Some(name) = target.name.as_mut() {
                        pseudonymize_in_place(name);
                    }
                }
            }
        }
        event.details = self.apply_details(event.details);
        event
    }

    pub fn apply_details(&self, mut details: Details) -> Details {
        match self.mode {
            UserDataMode::Retain => {}
            UserDataMode::Exclude => details.retain(|key, _| !is_user_id_key(key)),
            UserDataMode::Anonymize => {
                for (key, value) in details.iter_mut() {
                    if is_user_id_key(key) {
                        *value = pseudonymize_value(value);
                    }
                }
            }
        }
        details
    }
}
