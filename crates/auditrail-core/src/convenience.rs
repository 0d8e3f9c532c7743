//! Named wrappers over `AuditLogger::log` for the common audited actions.
//!
//! Each wrapper fixes the event type, fills actor/target consistently, and
//! shapes `details` the same way every time.  Payloads (prompts, responses,
//! tool inputs and outputs) are recorded verbatim only when
//! `include_payloads` is set; otherwise only their length is kept.  The
//! `options` argument supplies anything else (trace ids, extra details) and
//! never overrides the fields a wrapper sets itself.

use serde::Serialize;
use serde_json::Value;

use auditrail_contracts::{
    error::AuditResult,
    event::{Actor, AuditEvent, EventType, Outcome, Severity, Target},
};

use crate::{builder::LogOptions, logger::AuditLogger};

/// Token accounting for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// An error as it is recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub kind: Option<String>,
    /// Recorded only when `include_stack_traces` is set.
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            stack: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture `err` and its `source()` chain; the chain becomes the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            kind: None,
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}

/// The flavour of a security finding reported by an external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityKind {
    Blocked,
    Warning,
    PiiDetected,
    InjectionDetected,
    PolicyViolation,
}

impl SecurityKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Blocked => EventType::SecurityBlocked,
            Self::Warning => EventType::SecurityWarning,
            Self::PiiDetected => EventType::SecurityPiiDetected,
            Self::InjectionDetected => EventType::SecurityInjectionDetected,
            Self::PolicyViolation => EventType::SecurityPolicyViolation,
        }
    }
}

/// A security finding to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub kind: SecurityKind,
    pub severity: Severity,
    pub description: String,
    /// Whether the offending action was stopped.
    pub blocked: bool,
}

impl SecurityEvent {
    pub fn new(kind: SecurityKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            blocked: kind == SecurityKind::Blocked,
        }
    }

    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }
}

impl AuditLogger {
    /// Text payload, or its length when payloads are excluded.
    fn with_text(&self, options: LogOptions, key: &str, content: &str) -> LogOptions {
        if self.config().include_payloads {
            options.detail(key, content)
        } else {
            options.detail(format!("{}Length", key), content.chars().count())
        }
    }

    /// JSON payload, or the length of its serialized form when excluded.
    fn with_json(&self, options: LogOptions, key: &str, content: &Value) -> LogOptions {
        if self.config().include_payloads {
            options.detail(key, content)
        } else {
            let length = serde_json::to_string(content).map(|s| s.len()).unwrap_or(0);
            options.detail(format!("{}Length", key), length)
        }
    }

    fn with_error(&self, options: LogOptions, error: &ErrorInfo) -> LogOptions {
        let mut options = options.detail("error", &error.message);
        if let Some(kind) = &error.kind {
            options = options.detail("errorKind", kind);
        }
        if self.config().include_stack_traces {
            if let Some(stack) = &error.stack {
                options = options.detail("stack", stack);
            }
        }
        options
    }

    pub async fn log_agent_start(
        &self,
        agent_id: &str,
        input: &str,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .actor(Actor::agent(agent_id))
            .detail("agentId", agent_id);
        let base = self.with_text(base, "input", input);
        self.log(EventType::AgentRunStart, base.inherit(options)).await
    }

    pub async fn log_agent_end(
        &self,
        agent_id: &str,
        output: &str,
        duration_ms: u64,
        success: bool,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .actor(Actor::agent(agent_id))
            .outcome(if success { Outcome::Success } else { Outcome::Failure })
            .detail("agentId", agent_id)
            .detail("durationMs", duration_ms);
        let base = self.with_text(base, "output", output);
        self.log(EventType::AgentRunEnd, base.inherit(options)).await
    }

    pub async fn log_agent_error(
        &self,
        agent_id: &str,
        error: &ErrorInfo,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .actor(Actor::agent(agent_id))
            .outcome(Outcome::Failure)
            .detail("agentId", agent_id);
        let base = self.with_error(base, error);
        self.log(EventType::AgentRunError, base.inherit(options)).await
    }

    pub async fn log_llm_request(
        &self,
        provider: &str,
        model: &str,
        prompt: &str,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .target(Target::new("model", model))
            .detail("provider", provider)
            .detail("model", model);
        let base = self.with_text(base, "prompt", prompt);
        self.log(EventType::LlmRequest, base.inherit(options)).await
    }

    pub async fn log_llm_response(
        &self,
        provider: &str,
        model: &str,
        response: &str,
        usage: TokenUsage,
        duration_ms: u64,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .target(Target::new("model", model))
            .detail("provider", provider)
            .detail("model", model)
            .detail("usage", usage)
            .detail("totalTokens", usage.total())
            .detail("durationMs", duration_ms);
        let base = self.with_text(base, "response", response);
        self.log(EventType::LlmResponse, base.inherit(options)).await
    }

    pub async fn log_tool_call(
        &self,
        tool: &str,
        input: &Value,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .target(Target::new("tool", tool))
            .detail("tool", tool);
        let base = self.with_json(base, "input", input);
        self.log(EventType::ToolCall, base.inherit(options)).await
    }

    pub async fn log_tool_result(
        &self,
        tool: &str,
        output: &Value,
        duration_ms: u64,
        success: bool,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .target(Target::new("tool", tool))
            .outcome(if success { Outcome::Success } else { Outcome::Failure })
            .detail("tool", tool)
            .detail("durationMs", duration_ms);
        let base = self.with_json(base, "output", output);
        self.log(EventType::ToolResult, base.inherit(options)).await
    }

    /// Authentication attempt: `auth.success` or `auth.failure`.
    pub async fn log_auth(
        &self,
        actor: Actor,
        method: &str,
        success: bool,
        reason: Option<&str>,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let (event_type, outcome) = if success {
            (EventType::AuthSuccess, Outcome::Success)
        } else {
            (EventType::AuthFailure, Outcome::Failure)
        };
        let mut base = LogOptions::new()
            .actor(actor)
            .outcome(outcome)
            .detail("method", method);
        if let Some(reason) = reason {
            base = base.detail("reason", reason);
        }
        self.log(event_type, base.inherit(options)).await
    }

    /// Authorization decision: `auth.access_granted` or `auth.access_denied`.
    pub async fn log_authorization(
        &self,
        actor: Actor,
        resource: Target,
        action: &str,
        granted: bool,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let (event_type, outcome) = if granted {
            (EventType::AuthAccessGranted, Outcome::Success)
        } else {
            (EventType::AuthAccessDenied, Outcome::Blocked)
        };
        let base = LogOptions::new()
            .actor(actor)
            .target(resource)
            .outcome(outcome)
            .detail("action", action);
        self.log(event_type, base.inherit(options)).await
    }

    pub async fn log_security_event(
        &self,
        event: SecurityEvent,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .outcome(if event.blocked { Outcome::Blocked } else { Outcome::Warning })
            .severity(event.severity)
            .detail("description", &event.description)
            .detail("blocked", event.blocked);
        self.log(event.kind.event_type(), base.inherit(options)).await
    }

    /// Setting change.  Both values are redacted when `key` itself is a
    /// sensitive field name.
    pub async fn log_config_change(
        &self,
        actor: Actor,
        key: &str,
        old_value: &Value,
        new_value: &Value,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = LogOptions::new()
            .actor(actor)
            .target(Target::new("config", key))
            .detail("key", key)
            .detail("oldValue", self.redact_value(key, old_value.clone()))
            .detail("newValue", self.redact_value(key, new_value.clone()));
        self.log(EventType::ConfigChange, base.inherit(options)).await
    }

    pub async fn log_error(
        &self,
        error: &ErrorInfo,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let base = self.with_error(LogOptions::new().outcome(Outcome::Failure), error);
        self.log(EventType::SystemError, base.inherit(options)).await
    }
}
