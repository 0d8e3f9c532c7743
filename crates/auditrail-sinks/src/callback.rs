//! In-process handler destination.
//!
//! Backs `kind = "custom"` entries in the configuration: the handler is
//! registered in code under the configured name.  Handlers are synchronous
//! and may block; each call runs on tokio's blocking pool so the logger's
//! per-destination timeout still applies.

use std::sync::Arc;

use async_trait::async_trait;

use auditrail_contracts::{
    config::DestinationFilter,
    error::{AuditError, AuditResult},
    event::AuditEvent,
};
use auditrail_core::traits::Destination;

/// Synchronous batch handler.
pub type BatchHandler = Arc<dyn Fn(&[AuditEvent]) -> AuditResult<()> + Send + Sync>;

#[derive(Clone)]
pub struct CallbackDestination {
    name: String,
    handler: BatchHandler,
    filter: Option<DestinationFilter>,
}

impl CallbackDestination {
    pub fn new(name: impl Into<String>, handler: BatchHandler) -> Self {
        Self {
            name: name.into(),
            handler,
            filter: None,
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[AuditEvent]) -> AuditResult<()> + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(handler))
    }

    pub fn with_filter(mut self, filter: Option<DestinationFilter>) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl Destination for CallbackDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, event: &AuditEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(event))
    }

    async fn deliver(&self, batch: &[AuditEvent]) -> AuditResult<()> {
        let handler = Arc::clone(&self.handler);
        let batch = batch.to_vec();
        // A timed-out call keeps its blocking thread until the handler returns.
        tokio::task::spawn_blocking(move || handler(&batch))
            .await
            .map_err(|e| AuditError::Delivery {
                destination: self.name.clone(),
                reason: e.to_string(),
            })?
    }
}
