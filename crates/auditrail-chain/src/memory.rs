//! Bounded in-memory storage.
//!
//! `InMemoryAuditStorage` keeps the newest `capacity` events in a ring
//! buffer.  When a write overflows it, the oldest events are evicted and
//! the anchor moves to the hash of the newest evicted event, so the
//! surviving tail still verifies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use auditrail_contracts::{
    error::{AuditError, AuditResult},
    event::{AuditEvent, EventId},
    query::QueryFilter,
};
use auditrail_core::traits::AuditStorage;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct MemoryState {
    /// Retained events, oldest first.
    pub(crate) events: VecDeque<AuditEvent>,

    /// `prev_hash` expected of the oldest retained event.
    pub(crate) anchor: String,
}

// ── Public storage ────────────────────────────────────────────────────────────

/// Ring-buffer storage holding at most `capacity` events.
#[derive(Clone)]
pub struct InMemoryAuditStorage {
    capacity: usize,
    pub(crate) state: Arc<Mutex<MemoryState>>,
}

impl InMemoryAuditStorage {
    /// A zero `capacity` is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(MemoryState {
                events: VecDeque::new(),
                anchor: String::new(),
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.events.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|e| AuditError::Storage {
            reason: format!("memory storage lock poisoned: {}", e),
        })
    }
}

impl Default for InMemoryAuditStorage {
    fn default() -> Self {
        Self::new(auditrail_contracts::config::StorageConfig::DEFAULT_CAPACITY)
    }
}

impl AuditStorage for InMemoryAuditStorage {
    fn write_batch(&self, events: &[AuditEvent]) -> AuditResult<()> {
        let mut state = self.lock()?;
        state.events.extend(events.iter().cloned());

        let mut evicted = 0;
        while state.events.len() > self.capacity {
            if let Some(oldest) = state.events.pop_front() {
                state.anchor = oldest.hash;
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "memory storage evicted oldest events");
        }
        Ok(())
    }

    fn query(&self, filter: &QueryFilter) -> AuditResult<Vec<AuditEvent>> {
        Ok(filter.apply(self.lock()?.events.iter()))
    }

    fn get(&self, id: &EventId) -> AuditResult<Option<AuditEvent>> {
        Ok(self.lock()?.events.iter().find(|e| &e.id == id).cloned())
    }

    fn count(&self, filter: &QueryFilter) -> AuditResult<usize> {
        Ok(filter.count(self.lock()?.events.iter()))
    }

    fn all(&self) -> AuditResult<Vec<AuditEvent>> {
        Ok(self.lock()?.events.iter().cloned().collect())
    }

    fn tail_hash(&self) -> AuditResult<Option<String>> {
        Ok(self.lock()?.events.back().map(|e| e.hash.clone()))
    }

    fn anchor(&self) -> AuditResult<String> {
        Ok(self.lock()?.anchor.clone())
    }

    fn cleanup(&self, cutoff: DateTime<Utc>) -> AuditResult<usize> {
        let mut state = self.lock()?;
        let mut deleted = 0;
        while state.events.front().is_some_and(|e| e.timestamp < cutoff) {
            if let Some(expired) = state.events.pop_front() {
                state.anchor = expired.hash;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
