//! # auditrail-sinks
//!
//! Delivery destinations for flushed audit batches.
//!
//! - `FileDestination`: rotating JSON-lines file
//! - `ConsoleDestination`: stdout, JSON or one-line summaries
//! - `CallbackDestination`: an in-process handler (`kind = "custom"`)
//!
//! Each destination applies its own optional `DestinationFilter` through
//! `Destination::accepts`, after the logger's global filters.

pub mod callback;
pub mod console;
pub mod file;

pub use callback::{BatchHandler, CallbackDestination};
pub use console::{ConsoleDestination, CONSOLE_DESTINATION};
pub use file::{rotated_path, FileDestination};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant, SystemTime};

    use auditrail_contracts::{
        config::{DestinationFilter, RotationConfig},
        error::AuditError,
        event::{AuditEvent, EventCategory, EventType, Outcome, Severity},
    };
    use auditrail_core::{traits::Destination, EventBuilder, LogOptions};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_event(event_type: EventType, options: LogOptions) -> AuditEvent {
        let mut event = EventBuilder::new("sink-tests").build(event_type, options);
        event.hash = "0123456789abcdef0123456789abcdef".to_string();
        event
    }

    fn batch(n: usize) -> Vec<AuditEvent> {
        (0..n)
            .map(|i| make_event(EventType::ToolCall, LogOptions::new().detail("i", i).trace("t1")))
            .collect()
    }

    // ── File ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_file_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let sink = FileDestination::new(&path, RotationConfig::default());

        let events = batch(3);
        sink.deliver(&events[..2]).await.unwrap();
        sink.deliver(&events[2..]).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, events[0]);
        assert!(lines[0].contains(r#""type":"tool.call""#));
        assert!(sink.name().starts_with("file:"));
    }

    #[tokio::test]
    async fn test_file_rotates_by_size_and_keeps_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let rotation = RotationConfig {
            max_file_size: 1,
            max_files: 2,
            rotate_daily: false,
        };
        let sink = FileDestination::new(&path, rotation);

        let events = batch(4);
        for event in &events {
            sink.deliver(std::slice::from_ref(event)).await.unwrap();
        }

        // Newest in the active file, then .1 and .2; the oldest was dropped.
        let read_id = |p: std::path::PathBuf| {
            let line = std::fs::read_to_string(p).unwrap();
            serde_json::from_str::<AuditEvent>(line.trim()).unwrap().id
        };
        assert_eq!(read_id(path.clone()), events[3].id);
        assert_eq!(read_id(rotated_path(&path, 1)), events[2].id);
        assert_eq!(read_id(rotated_path(&path, 2)), events[1].id);
        assert!(!rotated_path(&path, 3).exists());
    }

    #[tokio::test]
    async fn test_file_without_rotation_below_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileDestination::new(&path, RotationConfig::default());

        sink.deliver(&batch(1)).await.unwrap();
        sink.deliver(&batch(1)).await.unwrap();
        assert!(!rotated_path(&path, 1).exists());
    }

    #[tokio::test]
    async fn test_file_rotates_when_last_written_on_earlier_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let rotation = RotationConfig {
            rotate_daily: true,
            ..RotationConfig::default()
        };
        let sink = FileDestination::new(&path, rotation);

        let events = batch(2);
        sink.deliver(&events[..1]).await.unwrap();
        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 24 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(two_days_ago)
            .unwrap();

        sink.deliver(&events[1..]).await.unwrap();

        let rotated = std::fs::read_to_string(rotated_path(&path, 1)).unwrap();
        let active = std::fs::read_to_string(&path).unwrap();
        assert_eq!(rotated.lines().count(), 1);
        assert_eq!(active.lines().count(), 1);
        assert!(rotated.contains(events[0].id.as_str()));
        assert!(active.contains(events[1].id.as_str()));
    }

    #[tokio::test]
    async fn test_file_written_today_is_not_rotated_daily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let rotation = RotationConfig {
            rotate_daily: true,
            ..RotationConfig::default()
        };
        let sink = FileDestination::new(&path, rotation);

        sink.deliver(&batch(1)).await.unwrap();
        sink.deliver(&batch(1)).await.unwrap();
        assert!(!rotated_path(&path, 1).exists());
    }

    #[test]
    fn test_destination_filter_applies() {
        let sink = FileDestination::new("unused.jsonl", RotationConfig::default()).with_filter(Some(
            DestinationFilter {
                min_severity: Some(Severity::High),
                categories: Some(vec![EventCategory::Security]),
                outcomes: None,
            },
        ));

        let high = make_event(EventType::SecurityBlocked, LogOptions::new().severity(Severity::High));
        let low = make_event(EventType::SecurityBlocked, LogOptions::new().severity(Severity::Low));
        let tool = make_event(EventType::ToolCall, LogOptions::new().severity(Severity::Critical));

        assert!(sink.accepts(&high));
        assert!(!sink.accepts(&low));
        assert!(!sink.accepts(&tool));
    }

    // ── Console ───────────────────────────────────────────────────────────────

    #[test]
    fn test_console_json_line() {
        let event = make_event(EventType::ToolCall, LogOptions::new());
        let line = ConsoleDestination::new(false).format_line(&event).unwrap();
        let parsed: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_console_pretty_summary() {
        let event = make_event(
            EventType::AuthAccessDenied,
            LogOptions::new().outcome(Outcome::Blocked).trace("t7"),
        );
        let line = ConsoleDestination::new(true).format_line(&event).unwrap();

        assert!(line.contains("auth.access_denied"));
        assert!(line.contains("blocked"));
        assert!(line.contains("actor=sink-tests"));
        assert!(line.contains("trace=t7"));
        assert!(line.contains("hash=0123456789ab"));
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn test_console_delivers() {
        let sink = ConsoleDestination::new(true);
        assert_eq!(sink.name(), CONSOLE_DESTINATION);
        sink.deliver(&batch(1)).await.unwrap();
    }

    // ── Callback ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_callback_receives_batch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink = CallbackDestination::from_fn("collector", move |events: &[AuditEvent]| {
            sink_seen.lock().unwrap().extend(events.iter().map(|e| e.id.clone()));
            Ok(())
        });

        let events = batch(2);
        sink.deliver(&events).await.unwrap();

        assert_eq!(sink.name(), "collector");
        assert_eq!(*seen.lock().unwrap(), vec![events[0].id.clone(), events[1].id.clone()]);
    }

    #[tokio::test]
    async fn test_blocking_callback_stays_within_timeout() {
        let sink = CallbackDestination::from_fn("slow", |_: &[AuditEvent]| {
            std::thread::sleep(Duration::from_millis(600));
            Ok(())
        });

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_millis(50), sink.deliver(&batch(1))).await;

        assert!(outcome.is_err(), "a blocked handler must not stall the caller");
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_callback_error_propagates() {
        let sink = CallbackDestination::from_fn("pager", |_: &[AuditEvent]| {
            Err(AuditError::Delivery {
                destination: "pager".to_string(),
                reason: "503".to_string(),
            })
        });
        let err = sink.deliver(&batch(1)).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
