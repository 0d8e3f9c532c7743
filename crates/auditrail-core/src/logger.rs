//! The audit logger: build → sanitize → filter → hash → buffer → flush.
//!
//! `AuditLogger` is a cheap, cloneable handle.  Every clone shares one hash
//! chain, one buffer, and one set of destinations, so a single logger is
//! passed explicitly through the call graph instead of living in a global.
//!
//! # Concurrency
//!
//! The chain head, the buffer, and the last-flush instant live together in
//! one `std::sync::Mutex`.  Hashing happens inside that critical section,
//! which is what orders concurrent callers in the chain.  Flushes (manual,
//! size-triggered, periodic, or final) serialize on an async flush lock and
//! drain the buffer under the state mutex, so a flush never sees a
//! half-appended buffer and two flushes never interleave.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use auditrail_contracts::{
    config::{AuditConfig, HashMode},
    error::{AuditError, AuditResult},
    event::{AuditEvent, EventId, EventType},
    query::{DeliveryFailure, FlushReport, QueryFilter, VerificationReport, STORAGE_DESTINATION},
};

use crate::{
    builder::{EventBuilder, LogOptions},
    dispatch::Dispatcher,
    integrity::verify_chain,
    traits::{
        AuditStorage, Destination, EntrySigner, EventPolicy, EventProcessor, HashEngine,
        ProcessorVerdict,
    },
};

/// Minimum spacing between automatic retention runs.
const RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Capacity of the delivery-failure broadcast channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

// ── Internal mutable state ────────────────────────────────────────────────────

struct ChainState {
    /// Hashed events awaiting a flush, in chain order.
    buffer: Vec<AuditEvent>,

    /// `hash` of the newest retained event, or empty before the first.
    last_hash: String,

    last_flush: Instant,

    last_retention: Option<Instant>,
}

struct LoggerInner {
    config: AuditConfig,
    builder: EventBuilder,
    policy: Box<dyn EventPolicy>,
    processor: Option<Box<dyn EventProcessor>>,
    hasher: Option<Box<dyn HashEngine>>,
    signer: Option<Box<dyn EntrySigner>>,
    dispatcher: Dispatcher,
    storage: Arc<dyn AuditStorage>,
    state: Mutex<ChainState>,
    flush_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    failures_tx: broadcast::Sender<DeliveryFailure>,
    background_failures: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Assembles an `AuditLogger` from a configuration and its collaborators.
///
/// ```rust,ignore
/// let logger = AuditLogger::builder(config)
///     .policy(Box::new(policy))
///     .hasher(Box::new(Sha256HashEngine))
///     .storage(Arc::new(InMemoryAuditStorage::new(10_000)))
///     .destination(Arc::new(console))
///     .build()?;
/// ```
pub struct AuditLoggerBuilder {
    config: AuditConfig,
    policy: Option<Box<dyn EventPolicy>>,
    processor: Option<Box<dyn EventProcessor>>,
    hasher: Option<Box<dyn HashEngine>>,
    signer: Option<Box<dyn EntrySigner>>,
    destinations: Vec<Arc<dyn Destination>>,
    storage: Option<Arc<dyn AuditStorage>>,
    start_timer: bool,
}

impl AuditLoggerBuilder {
    pub fn policy(mut self, policy: Box<dyn EventPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn processor(mut self, processor: Box<dyn EventProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn hasher(mut self, hasher: Box<dyn HashEngine>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn signer(mut self, signer: Box<dyn EntrySigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn AuditStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Skip the periodic flush timer; size-triggered and manual flushes
    /// still work.
    pub fn without_timer(mut self) -> Self {
        self.start_timer = false;
        self
    }

    /// Validate the configuration and collaborators and start the logger.
    ///
    /// The chain resumes from the storage's newest hash.  When called inside
    /// a tokio runtime the periodic flush timer is spawned on it.
    ///
    /// # Errors
    ///
    /// `AuditError::Config` for an invalid configuration, a missing policy or
    /// storage, or a hash engine that disagrees with the configured mode.
    pub fn build(self) -> AuditResult<AuditLogger> {
        self.config.validate()?;

        let policy = self.policy.ok_or_else(|| AuditError::Config {
            reason: "an event policy is required".to_string(),
        })?;
        let storage = self.storage.ok_or_else(|| AuditError::Config {
            reason: "a storage backend is required".to_string(),
        })?;

        let mode = self.config.effective_hash_mode();
        let hasher = match (mode, self.hasher) {
            (HashMode::Disabled, _) => None,
            (_, None) => {
                return Err(AuditError::Config {
                    reason: format!("tamper detection requires a '{}' hash engine", mode.as_str()),
                })
            }
            (_, Some(hasher)) if hasher.mode() != mode => {
                return Err(AuditError::Config {
                    reason: format!(
                        "hash engine computes '{}' but configuration requests '{}'",
                        hasher.mode().as_str(),
                        mode.as_str()
                    ),
                })
            }
            (_, Some(hasher)) => Some(hasher),
        };
        let signer = if self.config.sign_entries {
            Some(self.signer.ok_or_else(|| AuditError::Config {
                reason: "sign_entries requires an entry signer".to_string(),
            })?)
        } else {
            None
        };

        // An emptied store still remembers the hash its chain continues from.
        let last_hash = match (&hasher, storage.tail_hash()?) {
            (None, _) => String::new(),
            (Some(_), Some(tail)) => tail,
            (Some(_), None) => storage.anchor()?,
        };

        let (failures_tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let dispatcher = Dispatcher::new(self.destinations, self.config.destination_timeout());

        info!(
            service = %self.config.service_name,
            destinations = dispatcher.len(),
            hash_mode = mode.as_str(),
            buffer_size = self.config.buffer_size,
            resumed = !last_hash.is_empty(),
            "audit logger started"
        );

        let inner = Arc::new(LoggerInner {
            builder: EventBuilder::new(self.config.service_name.clone()),
            config: self.config,
            policy,
            processor: self.processor,
            hasher,
            signer,
            dispatcher,
            storage,
            state: Mutex::new(ChainState {
                buffer: Vec::new(),
                last_hash,
                last_flush: Instant::now(),
                last_retention: None,
            }),
            flush_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            failures_tx,
            background_failures: AtomicU64::new(0),
            timer: Mutex::new(None),
        });

        if self.start_timer {
            let timer = spawn_timer(&inner);
            if let Ok(mut slot) = inner.timer.lock() {
                *slot = timer;
            }
        }

        Ok(AuditLogger { inner })
    }
}

/// Spawn the periodic flush task on the current runtime, if there is one.
///
/// The task holds only a `Weak` reference and exits once the logger is
/// dropped or closed.
fn spawn_timer(inner: &Arc<LoggerInner>) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("no tokio runtime; periodic flush disabled");
        return None;
    };
    let weak: Weak<LoggerInner> = Arc::downgrade(inner);
    let period = inner.config.flush_interval();

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            if inner.is_closed() {
                break;
            }
            inner.on_tick().await;
        }
    }))
}

// ── Public handle ─────────────────────────────────────────────────────────────

/// Handle to a buffered, hash-chained audit log.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<LoggerInner>,
}

impl AuditLogger {
    pub fn builder(config: AuditConfig) -> AuditLoggerBuilder {
        AuditLoggerBuilder {
            config,
            policy: None,
            processor: None,
            hasher: None,
            signer: None,
            destinations: Vec::new(),
            storage: None,
            start_timer: true,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.inner.config
    }

    pub fn hash_mode(&self) -> HashMode {
        self.inner.config.effective_hash_mode()
    }

    /// The policy's redaction of a value that belongs to the setting `key`.
    pub(crate) fn redact_value(&self, key: &str, value: Value) -> Value {
        self.inner.policy.redact_value(key, value)
    }

    /// Record one event.
    ///
    /// Returns the event as chained, or `None` when a filter, the minimum
    /// severity, or the processor dropped it.  Downstream delivery and
    /// storage problems never surface here; if this call fills the buffer
    /// it flushes, and any failures go to `subscribe_failures`.
    ///
    /// # Latency
    ///
    /// Most calls only hash and buffer.  The call that fills the buffer
    /// (every `buffer_size`th event) also performs that flush before
    /// returning, so it waits for the storage write and for every
    /// destination, up to `destination_timeout_ms` per destination.
    /// Callers on a latency-sensitive path can keep `buffer_size` large and
    /// rely on the timer, or spawn the call.
    ///
    /// # Errors
    ///
    /// `Closed` after `close()`, `StatePoisoned` if a writer panicked, and
    /// `Serialization` if the event cannot be canonicalized.
    pub async fn log(
        &self,
        event_type: EventType,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        self.inner.log(event_type, options).await
    }

    /// Like `log`, with the type given by name (e.g. `"tool.call"`).
    ///
    /// # Errors
    ///
    /// `UnknownEventType` when `name` is not a known type.
    pub async fn log_named(
        &self,
        name: &str,
        options: LogOptions,
    ) -> AuditResult<Option<AuditEvent>> {
        let event_type: EventType = name.parse()?;
        self.log(event_type, options).await
    }

    /// Hand every buffered event to storage and all destinations.
    ///
    /// Returns once each destination has accepted, failed, or timed out.
    pub async fn flush(&self) -> AuditResult<FlushReport> {
        self.inner.flush().await
    }

    /// Events waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.inner
            .lock_state()
            .map(|state| state.buffer.len())
            .unwrap_or_default()
    }

    pub fn query(&self, filter: &QueryFilter) -> AuditResult<Vec<AuditEvent>> {
        self.inner.storage.query(filter)
    }

    pub fn get(&self, id: &EventId) -> AuditResult<Option<AuditEvent>> {
        self.inner.storage.get(id)
    }

    pub fn count(&self, filter: &QueryFilter) -> AuditResult<usize> {
        self.inner.storage.count(filter)
    }

    /// Verify `events`, or the whole store from its anchor when `None`.
    ///
    /// A supplied slice must be contiguous; its first `prev_hash` is taken
    /// as the anchor.
    ///
    /// # Errors
    ///
    /// Only when the store cannot be read.  Integrity findings are part of
    /// the returned report.
    pub fn verify_integrity(&self, events: Option<&[AuditEvent]>) -> AuditResult<VerificationReport> {
        let hasher = self.inner.hasher.as_deref();
        let signer = self.inner.signer.as_deref();
        match events {
            Some(events) => {
                let anchor = events
                    .first()
                    .map(|e| e.prev_hash.clone())
                    .unwrap_or_default();
                Ok(verify_chain(hasher, signer, events, &anchor))
            }
            None => {
                let events = self.inner.storage.all()?;
                let anchor = self.inner.storage.anchor()?;
                Ok(verify_chain(hasher, signer, &events, &anchor))
            }
        }
    }

    /// Delete stored events older than `older_than_days` and record the
    /// deletion as a `system.retention` event.
    ///
    /// Surviving events are not rehashed; full-store verification starts
    /// from the anchor the storage keeps.
    pub async fn cleanup(&self, older_than_days: u32) -> AuditResult<usize> {
        self.inner.cleanup(older_than_days).await
    }

    /// Run `cleanup` with the configured `retention_days`, if any.
    pub async fn enforce_retention(&self) -> AuditResult<Option<usize>> {
        self.inner.enforce_retention().await
    }

    /// Receive delivery failures from flushes nobody awaited.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.inner.failures_tx.subscribe()
    }

    /// Total delivery failures seen by size-triggered and timer flushes.
    pub fn background_failures(&self) -> u64 {
        self.inner.background_failures.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Stop the timer, flush one last time, and close every destination.
    ///
    /// The final flush is bounded by the destination timeout times the
    /// number of destinations (plus one); events still buffered after that
    /// are lost.  Later calls return an empty report.
    pub async fn close(&self) -> AuditResult<FlushReport> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(FlushReport::default());
        }
        if let Ok(mut slot) = inner.timer.lock() {
            if let Some(timer) = slot.take() {
                timer.abort();
            }
        }

        let budget = inner.dispatcher.timeout() * (inner.dispatcher.len() as u32 + 1);
        let mut report = match tokio::time::timeout(budget, inner.flush()).await {
            Ok(result) => result?,
            Err(_) => {
                let lost = self.pending();
                warn!(lost, "final audit flush timed out");
                FlushReport {
                    flushed: 0,
                    delivered: Vec::new(),
                    failures: vec![DeliveryFailure {
                        destination: "flush".to_string(),
                        reason: format!("final flush timed out after {} ms", budget.as_millis()),
                        events: lost,
                    }],
                }
            }
        };

        inner.dispatcher.close_all(&mut report).await;
        if let Err(e) = inner.storage.flush() {
            report.failures.push(DeliveryFailure {
                destination: STORAGE_DESTINATION.to_string(),
                reason: e.to_string(),
                events: 0,
            });
        }

        info!(
            flushed = report.flushed,
            failures = report.failures.len(),
            "audit logger closed"
        );
        Ok(report)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

impl LoggerInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> AuditResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| AuditError::StatePoisoned {
            reason: e.to_string(),
        })
    }

    async fn log(&self, event_type: EventType, options: LogOptions) -> AuditResult<Option<AuditEvent>> {
        if self.is_closed() {
            return Err(AuditError::Closed);
        }

        let event = self.builder.build(event_type, options);
        let event = self.policy.sanitize(event);
        let Some(event) = self.screen(event) else {
            return Ok(None);
        };

        let (event, flush_due) = self.append(event)?;
        if flush_due {
            self.background_flush().await;
        }
        Ok(Some(event))
    }

    /// Filter chain: policy rules first, then the processor hook.
    fn screen(&self, mut event: AuditEvent) -> Option<AuditEvent> {
        if !self.policy.admits(&event) {
            debug!(event_type = %event.event_type, "event dropped by filter");
            return None;
        }
        let Some(processor) = &self.processor else {
            return Some(event);
        };
        match processor.process(&event) {
            ProcessorVerdict::Keep => Some(event),
            ProcessorVerdict::Replace(details) => {
                event.details = self.policy.redact_details(details);
                Some(event)
            }
            ProcessorVerdict::Drop => {
                debug!(event_type = %event.event_type, "event dropped by processor");
                None
            }
        }
    }

    /// Chain and buffer one event.  Returns whether the buffer is now full.
    fn append(&self, mut event: AuditEvent) -> AuditResult<(AuditEvent, bool)> {
        let mut state = self.lock_state()?;

        if let Some(hasher) = &self.hasher {
            event.prev_hash = state.last_hash.clone();
            event.hash = hasher.hash_event(&event, &event.prev_hash)?;
            if let Some(signer) = &self.signer {
                event.signature = Some(signer.sign(&event.hash));
            }
            state.last_hash = event.hash.clone();
        }

        state.buffer.push(event.clone());
        let flush_due = state.buffer.len() >= self.config.buffer_size;

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            buffered = state.buffer.len(),
            "audit event chained"
        );
        Ok((event, flush_due))
    }

    async fn flush(&self) -> AuditResult<FlushReport> {
        let _flush_guard = self.flush_lock.lock().await;

        let batch = {
            let mut state = self.lock_state()?;
            state.last_flush = Instant::now();
            std::mem::take(&mut state.buffer)
        };

        let mut report = FlushReport {
            flushed: batch.len(),
            ..FlushReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        if let Err(e) = self.storage.write_batch(&batch) {
            warn!(error = %e, events = batch.len(), "audit storage write failed");
            report.failures.push(DeliveryFailure {
                destination: STORAGE_DESTINATION.to_string(),
                reason: e.to_string(),
                events: batch.len(),
            });
        }
        self.dispatcher.dispatch(&batch, &mut report).await;

        debug!(
            flushed = report.flushed,
            delivered = report.delivered.len(),
            failures = report.failures.len(),
            "audit buffer flushed"
        );
        Ok(report)
    }

    /// Flush with no caller waiting: failures are logged, counted, and
    /// broadcast instead of returned.
    async fn background_flush(&self) {
        match self.flush().await {
            Ok(report) => self.publish_failures(&report),
            Err(e) => {
                warn!(error = %e, "background audit flush failed");
                self.background_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn publish_failures(&self, report: &FlushReport) {
        for failure in &report.failures {
            self.background_failures.fetch_add(1, Ordering::Relaxed);
            // No subscribers is fine; the counter still records it.
            let _ = self.failures_tx.send(failure.clone());
        }
    }

    async fn on_tick(&self) {
        let (flush_due, retention_due) = match self.lock_state() {
            Ok(state) => (
                !state.buffer.is_empty()
                    && state.last_flush.elapsed() >= self.config.flush_interval(),
                self.config.retention_days.is_some()
                    && state
                        .last_retention
                        .map_or(true, |at| at.elapsed() >= RETENTION_PERIOD),
            ),
            Err(e) => {
                warn!(error = %e, "audit timer cannot read state");
                return;
            }
        };

        if flush_due {
            self.background_flush().await;
        }
        if retention_due {
            if let Err(e) = self.enforce_retention().await {
                warn!(error = %e, "scheduled retention cleanup failed");
                self.background_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn cleanup(&self, older_than_days: u32) -> AuditResult<usize> {
        if self.is_closed() {
            return Err(AuditError::Closed);
        }
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let deleted = self.storage.cleanup(cutoff)?;
        let anchor = self.storage.anchor()?;

        info!(deleted, older_than_days, anchor = %anchor, "retention cleanup completed");

        let record = LogOptions::new()
            .detail("olderThanDays", older_than_days)
            .detail("deleted", deleted)
            .detail("cutoff", cutoff.to_rfc3339())
            .detail("anchor", anchor);
        self.log(EventType::SystemRetention, record).await?;
        Ok(deleted)
    }

    async fn enforce_retention(&self) -> AuditResult<Option<usize>> {
        let Some(days) = self.config.retention_days else {
            return Ok(None);
        };
        {
            let mut state = self.lock_state()?;
            state.last_retention = Some(Instant::now());
        }
        self.cleanup(days).await.map(Some)
    }
}

impl Drop for LoggerInner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.timer.lock() {
            if let Some(timer) = slot.take() {
                timer.abort();
            }
        }
        if let Ok(state) = self.state.lock() {
            if !state.buffer.is_empty() {
                warn!(
                    lost = state.buffer.len(),
                    "audit logger dropped with unflushed events; call close() first"
                );
            }
        }
    }
}
