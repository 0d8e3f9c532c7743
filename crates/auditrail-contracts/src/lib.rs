//! # auditrail-contracts
//!
//! Shared types, configuration, and error contracts for the auditrail
//! tamper-evident audit log.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, canonical serialization and errors.

pub mod config;
pub mod error;
pub mod event;
pub mod query;

pub use config::{
    AuditConfig, DestinationConfig, DestinationFilter, HashMode, RotationConfig, StorageConfig,
};
pub use error::{AuditError, AuditResult};
pub use event::{
    Actor, ActorKind, AuditEvent, Details, EventCategory, EventId, EventType, Outcome, Severity,
    Target,
};
pub use query::{DeliveryFailure, FlushReport, QueryFilter, SortOrder, VerificationReport};

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn event(event_type: EventType) -> AuditEvent {
        AuditEvent {
            id: EventId::new(),
            timestamp: Utc::now(),
            event_type,
            category: event_type.category(),
            actor: Some(Actor::user("u-1")),
            target: None,
            outcome: Outcome::Success,
            details: Details::new(),
            trace_id: None,
            span_id: None,
            prev_hash: String::new(),
            hash: String::new(),
            signature: None,
        }
    }

    // ── EventType ────────────────────────────────────────────────────────────

    #[test]
    fn category_follows_type_prefix() {
        assert_eq!(EventType::AgentRunStart.category(), EventCategory::Agent);
        assert_eq!(EventType::LlmRequest.category(), EventCategory::Llm);
        assert_eq!(EventType::ToolCall.category(), EventCategory::Tool);
        assert_eq!(EventType::SecurityBlocked.category(), EventCategory::Security);
        assert_eq!(EventType::RagIngest.category(), EventCategory::Rag);
        assert_eq!(EventType::AuthFailure.category(), EventCategory::Auth);
        assert_eq!(EventType::ConfigChange.category(), EventCategory::Config);
        assert_eq!(EventType::SystemRetention.category(), EventCategory::System);
    }

    #[test]
    fn event_type_parses_its_own_name() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let err = "tool.teleport".parse::<EventType>().unwrap_err();
        assert!(matches!(err, AuditError::UnknownEventType { ref name } if name == "tool.teleport"));
    }

    #[test]
    fn event_type_serializes_as_dotted_name() {
        let json = serde_json::to_string(&EventType::SecurityPiiDetected).unwrap();
        assert_eq!(json, "\"security.pii_detected\"");
    }

    // ── Severity ─────────────────────────────────────────────────────────────

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_is_read_from_details_and_defaults_to_low() {
        let mut e = event(EventType::SecurityWarning);
        assert_eq!(e.severity(), None);
        assert_eq!(e.effective_severity(), Severity::Low);

        e.details.insert("severity".into(), json!("critical"));
        assert_eq!(e.severity(), Some(Severity::Critical));

        e.details.insert("severity".into(), json!("apocalyptic"));
        assert_eq!(e.effective_severity(), Severity::Low);
    }

    // ── Canonical form ───────────────────────────────────────────────────────

    #[test]
    fn canonical_bytes_exclude_hash_and_signature() {
        let mut e = event(EventType::ToolCall);
        let before = e.canonical_bytes().unwrap();
        e.hash = "abc".into();
        e.signature = Some("sig".into());
        assert_eq!(before, e.canonical_bytes().unwrap());
    }

    #[test]
    fn canonical_bytes_ignore_detail_insertion_order() {
        let mut a = event(EventType::ToolCall);
        let mut b = a.clone();
        a.details.insert("x".into(), json!(1));
        a.details.insert("a".into(), json!(2));
        b.details.insert("a".into(), json!(2));
        b.details.insert("x".into(), json!(1));
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn canonical_bytes_cover_prev_hash() {
        let mut e = event(EventType::ToolCall);
        let before = e.canonical_bytes().unwrap();
        e.prev_hash = "00ff".into();
        assert_ne!(before, e.canonical_bytes().unwrap());
    }

    #[test]
    fn persisted_form_uses_camel_case_and_type_key() {
        let mut e = event(EventType::ToolCall);
        e.trace_id = Some("t1".into());
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["type"], "tool.call");
        assert_eq!(value["category"], "tool");
        assert_eq!(value["traceId"], "t1");
        assert!(value.get("prevHash").is_some());
        assert!(value.get("signature").is_none());
    }

    // ── QueryFilter ──────────────────────────────────────────────────────────

    #[test]
    fn query_filter_matches_on_every_criterion() {
        let mut e = event(EventType::ToolCall);
        e.trace_id = Some("t1".into());
        e.target = Some(Target::new("tool", "search"));

        assert!(QueryFilter::new().matches(&e));
        assert!(QueryFilter::new().trace("t1").matches(&e));
        assert!(!QueryFilter::new().trace("t2").matches(&e));
        assert!(QueryFilter::new().actor("u-1").target("search").matches(&e));
        assert!(!QueryFilter::new().types([EventType::LlmRequest]).matches(&e));
        assert!(QueryFilter::new().categories([EventCategory::Tool]).matches(&e));
        assert!(!QueryFilter::new().outcome(Outcome::Failure).matches(&e));

        let hour = Duration::hours(1);
        assert!(QueryFilter::new().between(e.timestamp - hour, e.timestamp).matches(&e));
        assert!(!QueryFilter::new().between(e.timestamp + hour, e.timestamp + hour * 2).matches(&e));
    }

    #[test]
    fn query_filter_orders_and_paginates() {
        let base = Utc::now();
        let events: Vec<AuditEvent> = (0..5)
            .map(|i| {
                let mut e = event(EventType::ToolCall);
                e.timestamp = base + Duration::seconds(i);
                e.details.insert("i".into(), json!(i));
                e
            })
            .collect();

        let page = QueryFilter::new().offset(1).limit(2).apply(&events);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].details["i"], 1);
        assert_eq!(page[1].details["i"], 2);

        let desc = QueryFilter::new().descending().apply(&events);
        assert_eq!(desc[0].details["i"], 4);

        assert_eq!(QueryFilter::new().limit(1).count(&events), 5);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let ts = Utc::now();
        let events: Vec<AuditEvent> = (0..3)
            .map(|i| {
                let mut e = event(EventType::ToolCall);
                e.timestamp = ts;
                e.details.insert("i".into(), json!(i));
                e
            })
            .collect();
        let ordered = QueryFilter::new().apply(&events);
        let seen: Vec<i64> = ordered.iter().map(|e| e.details["i"].as_i64().unwrap()).collect();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn default_limit_applies() {
        let events: Vec<AuditEvent> = (0..150).map(|_| event(EventType::ToolCall)).collect();
        assert_eq!(QueryFilter::new().apply(&events).len(), query::DEFAULT_QUERY_LIMIT);
    }

    // ── Config ───────────────────────────────────────────────────────────────

    #[test]
    fn default_config_is_valid() {
        AuditConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let config = AuditConfig {
            buffer_size: 0,
            ..AuditConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn signing_without_key_is_rejected() {
        let config = AuditConfig {
            sign_entries: true,
            ..AuditConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuditError::Config { .. })));
    }

    #[test]
    fn duplicate_custom_destinations_are_rejected() {
        let custom = DestinationConfig::Custom {
            enabled: true,
            name: "pager".into(),
            filter: None,
        };
        let config = AuditConfig {
            destinations: vec![custom.clone(), custom],
            ..AuditConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pager"));
    }

    #[test]
    fn disabled_tamper_detection_reports_disabled_mode() {
        let config = AuditConfig {
            enable_tamper_detection: false,
            ..AuditConfig::default()
        };
        assert_eq!(config.effective_hash_mode(), HashMode::Disabled);
    }

    #[test]
    fn destination_filter_requires_all_conditions() {
        let mut e = event(EventType::SecurityBlocked);
        e.details.insert("severity".into(), json!("high"));
        e.outcome = Outcome::Blocked;

        let paging = DestinationFilter {
            min_severity: Some(Severity::High),
            ..DestinationFilter::default()
        };
        assert!(paging.matches(&e));

        let security_failures = DestinationFilter {
            categories: Some(vec![EventCategory::Security]),
            outcomes: Some(vec![Outcome::Failure]),
            ..DestinationFilter::default()
        };
        assert!(!security_failures.matches(&e));

        let plain = event(EventType::ToolCall);
        assert!(!paging.matches(&plain));
    }

    // ── AuditError display messages ──────────────────────────────────────────

    #[test]
    fn error_display_messages() {
        let err = AuditError::Delivery {
            destination: "file".into(),
            reason: "disk full".into(),
        };
        assert!(err.to_string().contains("file"));
        assert!(err.to_string().contains("disk full"));

        let err = AuditError::Timeout {
            destination: "webhook".into(),
            after_ms: 250,
        };
        assert!(err.to_string().contains("250 ms"));

        assert_eq!(AuditError::Closed.to_string(), "audit logger is closed");
    }
}
