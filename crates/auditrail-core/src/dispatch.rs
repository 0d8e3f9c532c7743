//! Fan-out of flushed batches to destinations.
//!
//! Destinations are called one after another, each bounded by the same
//! timeout.  A failing or hanging destination is recorded and skipped; the
//! remaining destinations still receive the batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use auditrail_contracts::{
    error::AuditError,
    event::AuditEvent,
    query::{DeliveryFailure, FlushReport},
};

use crate::traits::Destination;

/// Delivers batches to a fixed set of destinations.
pub struct Dispatcher {
    destinations: Vec<Arc<dyn Destination>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(destinations: Vec<Arc<dyn Destination>>, timeout: Duration) -> Self {
        Self {
            destinations,
            timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Offer `batch` to every destination and record the outcome of each.
    ///
    /// Each destination only receives the events its `accepts` predicate
    /// selects; destinations that select nothing are not called.
    pub async fn dispatch(&self, batch: &[AuditEvent], report: &mut FlushReport) {
        for destination in &self.destinations {
            let name = destination.name().to_string();
            let selected: Vec<AuditEvent> = batch
                .iter()
                .filter(|e| destination.accepts(e))
                .cloned()
                .collect();
            if selected.is_empty() {
                continue;
            }

            match tokio::time::timeout(self.timeout, destination.deliver(&selected)).await {
                Ok(Ok(())) => {
                    debug!(destination = %name, events = selected.len(), "batch delivered");
                    report.delivered.push((name, selected.len()));
                }
                Ok(Err(e)) => {
                    warn!(destination = %name, error = %e, "destination rejected batch");
                    report.failures.push(DeliveryFailure {
                        destination: name,
                        reason: e.to_string(),
                        events: selected.len(),
                    });
                }
                Err(_) => {
                    warn!(
                        destination = %name,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "destination timed out"
                    );
                    let reason = AuditError::Timeout {
                        destination: name.clone(),
                        after_ms: self.timeout.as_millis() as u64,
                    };
                    report.failures.push(DeliveryFailure {
                        reason: reason.to_string(),
                        destination: name,
                        events: selected.len(),
                    });
                }
            }
        }
    }

    /// Close every destination, collecting failures instead of stopping.
    pub async fn close_all(&self, report: &mut FlushReport) {
        for destination in &self.destinations {
            let closed = tokio::time::timeout(self.timeout, destination.close()).await;
            let reason = match closed {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("close timed out after {} ms", self.timeout.as_millis()),
            };
            warn!(destination = %destination.name(), reason = %reason, "destination close failed");
            report.failures.push(DeliveryFailure {
                destination: destination.name().to_string(),
                reason,
                events: 0,
            });
        }
    }
}
