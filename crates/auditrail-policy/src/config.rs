//! Loading `AuditConfig` from TOML.
//!
//! Field names are snake_case; every field is optional.  Parsing fails on
//! unknown enum values (an unrecognized severity or event type) and the
//! parsed configuration is validated before it is returned.
//!
//! ```toml
//! service_name = "agent-gateway"
//! buffer_size = 50
//! min_severity = "medium"
//! exclude_events = ["llm.request"]
//!
//! [[destinations]]
//! kind = "file"
//! path = "logs/audit.jsonl"
//!
//! [storage]
//! kind = "file"
//! path = "data/audit-store.jsonl"
//! ```

use std::path::Path;

use tracing::debug;

use auditrail_contracts::{
    config::AuditConfig,
    error::{AuditError, AuditResult},
};

/// Parse and validate a TOML configuration.
///
/// # Errors
///
/// `AuditError::Config` if the TOML is malformed, does not match the
/// schema, or fails `AuditConfig::validate`.
pub fn load_config_str(s: &str) -> AuditResult<AuditConfig> {
    let config: AuditConfig = toml::from_str(s).map_err(|e| AuditError::Config {
        reason: format!("failed to parse audit configuration: {}", e),
    })?;
    config.validate()?;
    debug!(
        service = %config.service_name,
        destinations = config.destinations.len(),
        "audit configuration loaded"
    );
    Ok(config)
}

/// Read `path` and parse it with `load_config_str`.
///
/// # Errors
///
/// `AuditError::Config` if the file cannot be read or its contents are
/// rejected by `load_config_str`.
pub fn load_config_file(path: &Path) -> AuditResult<AuditConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| AuditError::Config {
        reason: format!("failed to read configuration file '{}': {}", path.display(), e),
    })?;
    load_config_str(&contents)
}
