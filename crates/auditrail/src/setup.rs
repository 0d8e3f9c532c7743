//! Config-driven wiring of a complete audit logger.
//!
//! `AuditTrailBuilder` turns an `AuditConfig` into concrete components:
//!
//! - hash engine from `enable_tamper_detection` / `hash_algorithm`
//! - `HmacSigner` when `sign_entries` is set
//! - `ConfigPolicy` from the privacy, redaction and filter settings
//! - storage from `storage` (memory ring buffer or JSONL file)
//! - one destination per enabled `destinations` entry; `custom` entries
//!   are resolved against handlers registered on the builder by name

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use auditrail_chain::{engine_for, HmacSigner, InMemoryAuditStorage, JsonlAuditStorage};
use auditrail_contracts::{
    config::{AuditConfig, DestinationConfig, StorageConfig},
    error::{AuditError, AuditResult},
    event::AuditEvent,
};
use auditrail_core::{
    traits::{AuditStorage, Destination, EventProcessor},
    AuditLogger,
};
use auditrail_policy::ConfigPolicy;
use auditrail_sinks::{BatchHandler, CallbackDestination, ConsoleDestination, FileDestination};

/// Open the storage backend `config` describes.
///
/// # Errors
///
/// `AuditError::Storage` if a JSONL file cannot be opened or parsed.
pub fn open_storage(config: &StorageConfig) -> AuditResult<Arc<dyn AuditStorage>> {
    match config {
        StorageConfig::Memory { capacity } => Ok(Arc::new(InMemoryAuditStorage::new(*capacity))),
        StorageConfig::File { path } => Ok(Arc::new(JsonlAuditStorage::open(path.clone())?)),
    }
}

/// Build the enabled destinations of `config`.
///
/// # Errors
///
/// `AuditError::Config` when a `custom` destination names no registered
/// handler.
pub fn build_destinations(
    config: &AuditConfig,
    handlers: &HashMap<String, BatchHandler>,
) -> AuditResult<Vec<Arc<dyn Destination>>> {
    let mut destinations: Vec<Arc<dyn Destination>> = Vec::new();
    for entry in config.destinations.iter().filter(|d| d.enabled()) {
        let filter = entry.filter().cloned();
        let destination: Arc<dyn Destination> = match entry {
            DestinationConfig::File { path, .. } => Arc::new(
                FileDestination::new(path.clone(), config.rotation.clone()).with_filter(filter),
            ),
            DestinationConfig::Console { pretty, .. } => {
                Arc::new(ConsoleDestination::new(*pretty).with_filter(filter))
            }
            DestinationConfig::Custom { name, .. } => {
                let handler = handlers.get(name).ok_or_else(|| AuditError::Config {
                    reason: format!("no handler registered for custom destination '{}'", name),
                })?;
                Arc::new(CallbackDestination::new(name.clone(), Arc::clone(handler)).with_filter(filter))
            }
        };
        debug!(destination = %destination.name(), "destination configured");
        destinations.push(destination);
    }
    Ok(destinations)
}

/// Builds an `AuditLogger` from an `AuditConfig`.
///
/// ```rust,ignore
/// let logger = AuditTrailBuilder::new(config)
///     .handler_fn("pager", |events| pager.send(events))
///     .build()?;
/// ```
pub struct AuditTrailBuilder {
    config: AuditConfig,
    handlers: HashMap<String, BatchHandler>,
    processor: Option<Box<dyn EventProcessor>>,
    storage: Option<Arc<dyn AuditStorage>>,
    extra_destinations: Vec<Arc<dyn Destination>>,
    start_timer: bool,
}

impl AuditTrailBuilder {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            handlers: HashMap::new(),
            processor: None,
            storage: None,
            extra_destinations: Vec::new(),
            start_timer: true,
        }
    }

    /// Register the handler for `kind = "custom"` destinations named `name`.
    pub fn handler(mut self, name: impl Into<String>, handler: BatchHandler) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn handler_fn<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[AuditEvent]) -> AuditResult<()> + Send + Sync + 'static,
    {
        self.handler(name, Arc::new(handler))
    }

    pub fn processor(mut self, processor: Box<dyn EventProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Use `storage` instead of the one `config.storage` describes.
    pub fn storage(mut self, storage: Arc<dyn AuditStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Add a destination built in code, after the configured ones.
    pub fn destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.extra_destinations.push(destination);
        self
    }

    pub fn without_timer(mut self) -> Self {
        self.start_timer = false;
        self
    }

    /// # Errors
    ///
    /// `AuditError::Config` for an invalid configuration or an unresolved
    /// custom destination; `AuditError::Storage` if storage cannot be opened.
    pub fn build(self) -> AuditResult<AuditLogger> {
        self.config.validate()?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => open_storage(&self.config.storage)?,
        };
        let mut destinations = build_destinations(&self.config, &self.handlers)?;
        destinations.extend(self.extra_destinations);

        let mut builder = AuditLogger::builder(self.config.clone())
            .policy(Box::new(ConfigPolicy::from_config(&self.config)))
            .storage(storage);
        if let Some(hasher) = engine_for(self.config.effective_hash_mode()) {
            builder = builder.hasher(hasher);
        }
        if self.config.sign_entries {
            let key = self.config.signing_key.as_deref().unwrap_or_default();
            builder = builder.signer(Box::new(HmacSigner::new(key)?));
        }
        if let Some(processor) = self.processor {
            builder = builder.processor(processor);
        }
        if !self.start_timer {
            builder = builder.without_timer();
        }

        info!(
            service = %self.config.service_name,
            destinations = destinations.len(),
            "audit trail assembled"
        );
        for destination in destinations {
            builder = builder.destination(destination);
        }
        builder.build()
    }
}
