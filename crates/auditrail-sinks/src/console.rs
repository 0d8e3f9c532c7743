//! Stdout destination.

use std::io::Write;

use async_trait::async_trait;

use auditrail_contracts::{
    config::DestinationFilter,
    error::{AuditError, AuditResult},
    event::AuditEvent,
};
use auditrail_core::traits::Destination;

pub const CONSOLE_DESTINATION: &str = "console";

/// Prints each event as a JSON line, or a one-line summary when `pretty`.
#[derive(Debug, Clone, Default)]
pub struct ConsoleDestination {
    pretty: bool,
    filter: Option<DestinationFilter>,
}

impl ConsoleDestination {
    pub fn new(pretty: bool) -> Self {
        Self {
            pretty,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<DestinationFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// The line printed for `event`, without the trailing newline.
    pub fn format_line(&self, event: &AuditEvent) -> AuditResult<String> {
        if !self.pretty {
            return Ok(serde_json::to_string(event)?);
        }

        let mut line = format!(
            "[{}] {:<28} {:<8}",
            event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            event.event_type.as_str(),
            event.outcome.to_string(),
        );
        if let Some(actor) = event.actor_id() {
            line.push_str(&format!(" actor={}", actor));
        }
        if let Some(target) = event.target_id() {
            line.push_str(&format!(" target={}", target));
        }
        if let Some(trace) = &event.trace_id {
            line.push_str(&format!(" trace={}", trace));
        }
        if !event.hash.is_empty() {
            let short = &event.hash[..event.hash.len().min(12)];
            line.push_str(&format!(" hash={}", short));
        }
        Ok(line)
    }
}

#[async_trait]
impl Destination for ConsoleDestination {
    fn name(&self) -> &str {
        CONSOLE_DESTINATION
    }

    fn accepts(&self, event: &AuditEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(event))
    }

    async fn deliver(&self, batch: &[AuditEvent]) -> AuditResult<()> {
        let mut text = String::new();
        for event in batch {
            text.push_str(&self.format_line(event)?);
            text.push('\n');
        }
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| AuditError::Delivery {
                destination: CONSOLE_DESTINATION.to_string(),
                reason: e.to_string(),
            })
    }
}
