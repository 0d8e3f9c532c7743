//! Logger configuration.
//!
//! `AuditConfig` is deserialized from TOML (see `auditrail-policy::config`)
//! or built in code.  Every field has a default, so an empty document is a
//! valid configuration: in-memory storage, no destinations, SHA-256 chain,
//! buffer of 100 events flushed every five seconds.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditEvent, EventCategory, EventType, Outcome, Severity};

/// Fields redacted from `details` unless overridden.
pub const DEFAULT_REDACT_FIELDS: [&str; 7] = [
    "password",
    "token",
    "apiKey",
    "secret",
    "authorization",
    "creditCard",
    "ssn",
];

/// Which digest produces the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// SHA-256; cryptographically secure.
    #[default]
    Sha256,
    /// FNV-1a 64-bit rolling checksum.  Detects accidental edits only; a
    /// motivated attacker can forge it.
    Checksum,
    /// Tamper detection is off; events carry empty hashes.
    Disabled,
}

impl HashMode {
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, Self::Sha256)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Checksum => "checksum",
            Self::Disabled => "disabled",
        }
    }
}

/// Per-destination delivery predicate, independent of the global filters.
///
/// Every configured condition must hold for an event to be delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationFilter {
    pub min_severity: Option<Severity>,
    pub categories: Option<Vec<EventCategory>>,
    pub outcomes: Option<Vec<Outcome>>,
}

impl DestinationFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(min) = self.min_severity {
            if event.effective_severity() < min {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&event.category) {
                return false;
            }
        }
        if let Some(outcomes) = &self.outcomes {
            if !outcomes.contains(&event.outcome) {
                return false;
            }
        }
        true
    }
}

fn enabled_by_default() -> bool {
    true
}

/// One delivery target.
///
/// ```toml
/// [[destinations]]
/// kind = "file"
/// path = "/var/log/agent/audit.jsonl"
///
/// [[destinations]]
/// kind = "custom"
/// name = "pager"
/// filter = { min_severity = "high" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    /// Append JSON lines to a rotating file.
    File {
        #[serde(default = "enabled_by_default")]
        enabled: bool,
        path: PathBuf,
        #[serde(default)]
        filter: Option<DestinationFilter>,
    },
    /// Write each event to stdout.
    Console {
        #[serde(default = "enabled_by_default")]
        enabled: bool,
        /// Human-readable one-line summaries instead of JSON.
        #[serde(default)]
        pretty: bool,
        #[serde(default)]
        filter: Option<DestinationFilter>,
    },
    /// A handler registered in code under `name`.
    Custom {
        #[serde(default = "enabled_by_default")]
        enabled: bool,
        name: String,
        #[serde(default)]
        filter: Option<DestinationFilter>,
    },
}

impl DestinationConfig {
    pub fn enabled(&self) -> bool {
        match self {
            Self::File { enabled, .. } | Self::Console { enabled, .. } | Self::Custom { enabled, .. } => {
                *enabled
            }
        }
    }

    pub fn filter(&self) -> Option<&DestinationFilter> {
        match self {
            Self::File { filter, .. } | Self::Console { filter, .. } | Self::Custom { filter, .. } => {
                filter.as_ref()
            }
        }
    }
}

/// Rotation policy shared by every file destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotate once the active file reaches this many bytes.
    pub max_file_size: u64,
    /// Number of rotated files kept; the oldest beyond this are deleted.
    pub max_files: usize,
    /// Also rotate when the UTC date changes.
    pub rotate_daily: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_files: 5,
            rotate_daily: false,
        }
    }
}

/// Where flushed events are kept for query and verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Bounded ring buffer; the oldest events are evicted past `capacity`.
    Memory {
        #[serde(default = "StorageConfig::default_capacity")]
        capacity: usize,
    },
    /// Durable JSON-lines file, never evicted.
    File { path: PathBuf },
}

impl StorageConfig {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    fn default_capacity() -> usize {
        Self::DEFAULT_CAPACITY
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory {
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}

/// The complete logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Identity of the default system actor.
    pub service_name: String,

    pub destinations: Vec<DestinationConfig>,

    /// Event types that are never recorded.
    pub exclude_events: Vec<EventType>,

    /// When set, only these event types are recorded.
    pub events: Option<Vec<EventType>>,

    /// Events whose severity ranks below this are dropped.  Events without
    /// a severity rank as `low`.
    pub min_severity: Option<Severity>,

    /// Master switch for field redaction.
    pub hash_sensitive_data: bool,

    /// Top-level `details` keys whose values are replaced by `[REDACTED]`.
    pub redact_fields: Vec<String>,

    /// Pseudonymize user identifiers unless user data is excluded.
    pub gdpr_mode: bool,

    /// When false, user actors/targets and user-id detail keys are dropped.
    pub allow_user_data: bool,

    pub anonymize_users: bool,

    /// Stored events older than this are removed by retention enforcement.
    pub retention_days: Option<u32>,

    pub enable_tamper_detection: bool,

    pub hash_algorithm: HashMode,

    /// Attach an HMAC-SHA256 signature of each hash.
    pub sign_entries: bool,

    pub signing_key: Option<String>,

    /// Flush as soon as this many events are buffered.
    pub buffer_size: usize,

    pub flush_interval_ms: u64,

    /// Upper bound on a single destination's delivery of one batch.
    pub destination_timeout_ms: u64,

    pub rotation: RotationConfig,

    /// Record prompt/response/tool payloads verbatim instead of lengths.
    pub include_payloads: bool,

    pub include_stack_traces: bool,

    pub storage: StorageConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            service_name: "auditrail".to_string(),
            destinations: Vec::new(),
            exclude_events: Vec::new(),
            events: None,
            min_severity: None,
            hash_sensitive_data: true,
            redact_fields: DEFAULT_REDACT_FIELDS.iter().map(|s| s.to_string()).collect(),
            gdpr_mode: false,
            allow_user_data: true,
            anonymize_users: false,
            retention_days: None,
            enable_tamper_detection: true,
            hash_algorithm: HashMode::Sha256,
            sign_entries: false,
            signing_key: None,
            buffer_size: 100,
            flush_interval_ms: 5_000,
            destination_timeout_ms: 5_000,
            rotation: RotationConfig::default(),
            include_payloads: false,
            include_stack_traces: false,
            storage: StorageConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn destination_timeout(&self) -> Duration {
        Duration::from_millis(self.destination_timeout_ms)
    }

    /// The digest actually used for the chain.
    pub fn effective_hash_mode(&self) -> HashMode {
        if self.enable_tamper_detection {
            self.hash_algorithm
        } else {
            HashMode::Disabled
        }
    }

    /// Reject configurations that cannot produce a working logger.
    pub fn validate(&self) -> AuditResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(config_error("service_name must not be empty"));
        }
        if self.buffer_size == 0 {
            return Err(config_error("buffer_size must be at least 1"));
        }
        if self.flush_interval_ms == 0 {
            return Err(config_error("flush_interval_ms must be greater than 0"));
        }
        if self.destination_timeout_ms == 0 {
            return Err(config_error("destination_timeout_ms must be greater than 0"));
        }
        if self.hash_algorithm == HashMode::Disabled {
            return Err(config_error(
                "hash_algorithm cannot be 'disabled'; set enable_tamper_detection = false instead",
            ));
        }
        if self.sign_entries {
            match self.signing_key.as_deref() {
                Some(key) if !key.is_empty() => {}
                _ => return Err(config_error("sign_entries requires a non-empty signing_key")),
            }
            if !self.enable_tamper_detection {
                return Err(config_error("sign_entries requires enable_tamper_detection"));
            }
        }
        if self.rotation.max_file_size == 0 {
            return Err(config_error("rotation.max_file_size must be greater than 0"));
        }
        if self.rotation.max_files == 0 {
            return Err(config_error("rotation.max_files must be at least 1"));
        }
        match &self.storage {
            StorageConfig::Memory { capacity } if *capacity == 0 => {
                return Err(config_error("storage capacity must be at least 1"));
            }
            StorageConfig::File { path } if path.as_os_str().is_empty() => {
                return Err(config_error("storage path must not be empty"));
            }
            _ => {}
        }

        let mut custom_names = HashSet::new();
        for destination in &self.destinations {
            match destination {
                DestinationConfig::File { path, .. } if path.as_os_str().is_empty() => {
                    return Err(config_error("file destination requires a path"));
                }
                DestinationConfig::Custom { name, .. } => {
                    if name.is_empty() {
                        return Err(config_error("custom destination requires a name"));
                    }
                    if !custom_names.insert(name.as_str()) {
                        return Err(AuditError::Config {
                            reason: format!("duplicate custom destination '{}'", name),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn config_error(reason: &str) -> AuditError {
    AuditError::Config {
        reason: reason.to_string(),
    }
}
