//! Audit event types.
//!
//! `AuditEvent` is one immutable record in the hash chain.  Its `category`
//! is always derived from its `EventType`, and its `hash` commits to every
//! other field plus the previous event's hash, so editing or reordering
//! stored events is detectable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Open key→value map of action-specific data.
///
/// `serde_json::Map` keeps keys sorted, which keeps the canonical form of an
/// event independent of insertion order.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Key under which security-style events carry their severity.
pub const SEVERITY_KEY: &str = "severity";

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Process-unique identifier of an audit event, e.g. `evt_3f2a…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Create a new, unique event ID.
    pub fn new() -> Self {
        Self(format!("evt_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Event type and category ───────────────────────────────────────────────────

/// The coarse grouping of an event, derived from the prefix of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Agent,
    Llm,
    Tool,
    Security,
    Rag,
    Auth,
    Config,
    System,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Llm => "llm",
            Self::Tool => "tool",
            Self::Security => "security",
            Self::Rag => "rag",
            Self::Auth => "auth",
            Self::Config => "config",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of auditable actions.
///
/// Serialized as dotted names (`"tool.call"`, `"auth.failure"`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "agent.run.start")]
    AgentRunStart,
    #[serde(rename = "agent.run.end")]
    AgentRunEnd,
    #[serde(rename = "agent.run.error")]
    AgentRunError,
    #[serde(rename = "agent.step")]
    AgentStep,
    #[serde(rename = "llm.request")]
    LlmRequest,
    #[serde(rename = "llm.response")]
    LlmResponse,
    #[serde(rename = "llm.error")]
    LlmError,
    #[serde(rename = "tool.call")]
    ToolCall,
    #[serde(rename = "tool.result")]
    ToolResult,
    #[serde(rename = "tool.error")]
    ToolError,
    #[serde(rename = "security.blocked")]
    SecurityBlocked,
    #[serde(rename = "security.warning")]
    SecurityWarning,
    #[serde(rename = "security.pii_detected")]
    SecurityPiiDetected,
    #[serde(rename = "security.injection_detected")]
    SecurityInjectionDetected,
    #[serde(rename = "security.policy_violation")]
    SecurityPolicyViolation,
    #[serde(rename = "rag.query")]
    RagQuery,
    #[serde(rename = "rag.ingest")]
    RagIngest,
    #[serde(rename = "auth.success")]
    AuthSuccess,
    #[serde(rename = "auth.failure")]
    AuthFailure,
    #[serde(rename = "auth.access_granted")]
    AuthAccessGranted,
    #[serde(rename = "auth.access_denied")]
    AuthAccessDenied,
    #[serde(rename = "config.change")]
    ConfigChange,
    #[serde(rename = "config.load")]
    ConfigLoad,
    #[serde(rename = "system.start")]
    SystemStart,
    #[serde(rename = "system.shutdown")]
    SystemShutdown,
    #[serde(rename = "system.error")]
    SystemError,
    #[serde(rename = "system.retention")]
    SystemRetention,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 27] = [
        Self::AgentRunStart,
        Self::AgentRunEnd,
        Self::AgentRunError,
        Self::AgentStep,
        Self::LlmRequest,
        Self::LlmResponse,
        Self::LlmError,
        Self::ToolCall,
        Self::ToolResult,
        Self::ToolError,
        Self::SecurityBlocked,
        Self::SecurityWarning,
        Self::SecurityPiiDetected,
        Self::SecurityInjectionDetected,
        Self::SecurityPolicyViolation,
        Self::RagQuery,
        Self::RagIngest,
        Self::AuthSuccess,
        Self::AuthFailure,
        Self::AuthAccessGranted,
        Self::AuthAccessDenied,
        Self::ConfigChange,
        Self::ConfigLoad,
        Self::SystemStart,
        Self::SystemShutdown,
        Self::SystemError,
        Self::SystemRetention,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentRunStart => "agent.run.start",
            Self::AgentRunEnd => "agent.run.end",
            Self::AgentRunError => "agent.run.error",
            Self::AgentStep => "agent.step",
            Self::LlmRequest => "llm.request",
            Self::LlmResponse => "llm.response",
            Self::LlmError => "llm.error",
            Self::ToolCall => "tool.call",
            Self::ToolResult => "tool.result",
            Self::ToolError => "tool.error",
            Self::SecurityBlocked => "security.blocked",
            Self::SecurityWarning => "security.warning",
            Self::SecurityPiiDetected => "security.pii_detected",
            Self::SecurityInjectionDetected => "security.injection_detected",
            Self::SecurityPolicyViolation => "security.policy_violation",
            Self::RagQuery => "rag.query",
            Self::RagIngest => "rag.ingest",
            Self::AuthSuccess => "auth.success",
            Self::AuthFailure => "auth.failure",
            Self::AuthAccessGranted => "auth.access_granted",
            Self::AuthAccessDenied => "auth.access_denied",
            Self::ConfigChange => "config.change",
            Self::ConfigLoad => "config.load",
            Self::SystemStart => "system.start",
            Self::SystemShutdown => "system.shutdown",
            Self::SystemError => "system.error",
            Self::SystemRetention => "system.retention",
        }
    }

    /// The category this type belongs to, taken from its dotted prefix.
    ///
    /// This is the only way an event acquires a category.
    pub fn category(&self) -> EventCategory {
        match self.as_str().split('.').next() {
            Some("agent") => EventCategory::Agent,
            Some("llm") => EventCategory::Llm,
            Some("tool") => EventCategory::Tool,
            Some("security") => EventCategory::Security,
            Some("rag") => EventCategory::Rag,
            Some("auth") => EventCategory::Auth,
            Some("config") => EventCategory::Config,
            _ => EventCategory::System,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AuditError::UnknownEventType {
                name: s.to_string(),
            })
    }
}

// ── Outcome and severity ──────────────────────────────────────────────────────

/// How the audited action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Success,
    Failure,
    Blocked,
    Warning,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Blocked => "blocked",
            Self::Warning => "warning",
        })
    }
}

/// Ordered severity: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(AuditError::Config {
                reason: format!("unrecognized severity '{}'", other),
            }),
        }
    }
}

// ── Actor and target ──────────────────────────────────────────────────────────

/// What kind of principal triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    User,
    Agent,
    System,
    Service,
}

/// Who or what triggered an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl Actor {
    pub fn new(kind: ActorKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: None,
            roles: None,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ActorKind::User, id)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(ActorKind::Agent, id)
    }

    pub fn service(id: impl Into<String>) -> Self {
        Self::new(ActorKind::Service, id)
    }

    /// The default actor substituted when a caller supplies none.
    pub fn system(service_name: &str) -> Self {
        Self {
            kind: ActorKind::System,
            id: service_name.to_string(),
            name: Some(service_name.to_string()),
            roles: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_user(&self) -> bool {
        self.kind == ActorKind::User
    }
}

/// The subject of an audited action.
///
/// `kind` is free-form (`"tool"`, `"model"`, `"user"`, `"config"`, …); a
/// target whose kind is `"user"` is treated as personal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Target {
    pub const USER_KIND: &'static str = "user";

    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.kind == Self::USER_KIND
    }
}

// ── The event ─────────────────────────────────────────────────────────────────

/// A single entry in the audit hash chain.
///
/// Modifying any field invalidates `hash`, and the next event's `prev_hash`
/// no longer matches the recomputed value, which `verify_chain` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: EventId,

    /// When the event was built (not when it was flushed).
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Always `event_type.category()`.
    pub category: EventCategory,

    /// `None` only when personal-data exclusion removed a user actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    pub outcome: Outcome,

    #[serde(default)]
    pub details: Details,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    /// Hash of the previous retained event, or empty for the first one.
    #[serde(default)]
    pub prev_hash: String,

    /// Digest of this event's canonical form concatenated with `prev_hash`.
    /// Empty when tamper detection is disabled.
    #[serde(default)]
    pub hash: String,

    /// HMAC of `hash`, present only when entry signing is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Borrowed view of every hash-relevant field, in fixed order.
///
/// Optional fields serialize as `null` rather than being skipped so that
/// the layout never depends on which fields happen to be set.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalEvent<'a> {
    id: &'a EventId,
    timestamp: &'a DateTime<Utc>,
    #[serde(rename = "type")]
    event_type: EventType,
    category: EventCategory,
    actor: Option<&'a Actor>,
    target: Option<&'a Target>,
    outcome: Outcome,
    details: &'a Details,
    trace_id: Option<&'a str>,
    span_id: Option<&'a str>,
    prev_hash: &'a str,
}

impl AuditEvent {
    /// Canonical JSON of every field except `hash` and `signature`.
    pub fn canonical_bytes(&self) -> AuditResult<Vec<u8>> {
        let canonical = CanonicalEvent {
            id: &self.id,
            timestamp: &self.timestamp,
            event_type: self.event_type,
            category: self.category,
            actor: self.actor.as_ref(),
            target: self.target.as_ref(),
            outcome: self.outcome,
            details: &self.details,
            trace_id: self.trace_id.as_deref(),
            span_id: self.span_id.as_deref(),
            prev_hash: &self.prev_hash,
        };
        Ok(serde_json::to_vec(&canonical)?)
    }

    /// Severity carried in `details.severity`, if any and recognizable.
    pub fn severity(&self) -> Option<Severity> {
        self.details
            .get(SEVERITY_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Severity used for threshold comparisons: events without one rank lowest.
    pub fn effective_severity(&self) -> Severity {
        self.severity().unwrap_or(Severity::Low)
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor.as_ref().map(|a| a.id.as_str())
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.id.as_str())
    }
}
