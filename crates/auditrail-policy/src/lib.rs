//! # auditrail-policy
//!
//! Data protection and filtering for audit events, plus TOML configuration
//! loading.
//!
//! - `Redactor`: replaces configured `details` values with `[REDACTED]`
//! - `PrivacyGuard`: GDPR exclusion or pseudonymization of user identities
//! - `FilterChain`: exclude list, allow-list and minimum severity
//! - `ConfigPolicy`: the three above as one `EventPolicy`
//! - `config::{load_config_str, load_config_file}`: parse and validate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditrail_policy::{config::load_config_file, ConfigPolicy};
//!
//! let config = load_config_file(Path::new("audit.toml"))?;
//! let policy = ConfigPolicy::from_config(&config);
//! ```

pub mod config;
pub mod engine;
pub mod filter;
pub mod privacy;
pub mod redact;

pub use engine::ConfigPolicy;
pub use filter::{DropReason, FilterChain};
pub use privacy::{is_user_id_key, pseudonymize, PrivacyGuard, UserDataMode};
pub use redact::{Redactor, REDACTED};

// ── Tests ─────────────────────────────────────────────────────────────────────
