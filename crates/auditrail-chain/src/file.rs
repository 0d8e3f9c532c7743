//! Durable JSON-lines storage.
//!
//! One event per line, appended in chain order.  The whole file is loaded
//! on open so queries are served from memory and a restarted logger can
//! resume the chain from `tail_hash()`.
//!
//! Cleanup rewrites the file through a temporary sibling and an atomic
//! rename.  The anchor lives next to the log in `<file>.anchor`, since the
//! events that justified it are gone once cleanup has run.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use auditrail_contracts::{
    error::{AuditError, AuditResult},
    event::{AuditEvent, EventId},
    query::QueryFilter,
};
use auditrail_core::traits::AuditStorage;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct FileState {
    /// Every event in the file, in order.  Mirrors the file exactly.
    pub(crate) events: Vec<AuditEvent>,
    pub(crate) anchor: String,
    /// Empty between calls; every write ends with a flush.
    pub(crate) writer: BufWriter<File>,
}

// ── Public storage ────────────────────────────────────────────────────────────

/// Append-only JSONL file storage.  Never evicts.
pub struct JsonlAuditStorage {
    path: PathBuf,
    anchor_path: PathBuf,
    pub(crate) state: Mutex<FileState>,
}

fn storage_error(path: &Path, action: &str, e: impl std::fmt::Display) -> AuditError {
    AuditError::Storage {
        reason: format!("cannot {} '{}': {}", action, path.display(), e),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn open_append(path: &Path) -> AuditResult<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| storage_error(path, "open", e))
}

/// Parse every non-blank line of `path`; a missing file is empty.
pub fn read_events(path: &Path) -> AuditResult<Vec<AuditEvent>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(storage_error(path, "open", e)),
    };

    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| storage_error(path, "read", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AuditEvent = serde_json::from_str(&line).map_err(|e| AuditError::Storage {
            reason: format!("malformed event at {}:{}: {}", path.display(), index + 1, e),
        })?;
        events.push(event);
    }
    Ok(events)
}

fn write_lines(writer: &mut impl Write, events: &[AuditEvent]) -> AuditResult<()> {
    for event in events {
        serde_json::to_writer(&mut *writer, event)?;
        writer
            .write_all(b"\n")
            .map_err(|e| AuditError::Storage { reason: e.to_string() })?;
    }
    Ok(())
}

impl JsonlAuditStorage {
    /// Open `path`, creating it (and its parent directory) if needed.
    ///
    /// # Errors
    ///
    /// `AuditError::Storage` if the file cannot be read or a line is not a
    /// valid event; the message names the offending line.
    pub fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| storage_error(parent, "create", e))?;
        }

        let events = read_events(&path)?;
        let anchor_path = sibling(&path, ".anchor");
        let anchor = match fs::read_to_string(&anchor_path) {
            Ok(anchor) => anchor.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(storage_error(&anchor_path, "read", e)),
        };
        let writer = open_append(&path)?;

        info!(path = %path.display(), events = events.len(), "audit storage opened");

        Ok(Self {
            path,
            anchor_path,
            state: Mutex::new(FileState {
                events,
                anchor,
                writer,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, FileState>> {
        self.state.lock().map_err(|e| AuditError::Storage {
            reason: format!("file storage lock poisoned: {}", e),
        })
    }

    /// Put the file back to `len` bytes after a failed append.
    ///
    /// Bytes still queued in the old writer are discarded, not flushed.
    fn roll_back(&self, state: &mut FileState, len: u64) -> AuditResult<()> {
        let fresh = open_append(&self.path)?;
        let (_file, _unwritten) = std::mem::replace(&mut state.writer, fresh).into_parts();
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| file.set_len(len))
            .map_err(|e| storage_error(&self.path, "truncate", e))
    }
}

impl AuditStorage for JsonlAuditStorage {
    /// Appends the whole batch or nothing: a failed write truncates the
    /// file back to its previous length and leaves `events` unchanged.
    fn write_batch(&self, events: &[AuditEvent]) -> AuditResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut payload = Vec::new();
        write_lines(&mut payload, events)?;

        let mut state = self.lock()?;
        let len = state
            .writer
            .get_ref()
            .metadata()
            .map_err(|e| storage_error(&self.path, "stat", e))?
            .len();

        let written = state.writer.write_all(&payload);
        let written = written.and_then(|_| state.writer.flush());
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "append failed; rolling back");
            self.roll_back(&mut state, len)?;
            return Err(storage_error(&self.path, "write", e));
        }

        state.events.extend_from_slice(events);
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
        Ok(self.lock()?.events.clone())
    }

    fn tail_hash(&self) -> AuditResult<Option<String>> {
        Ok(self.lock()?.events.last().map(|e| e.hash.clone()))
    }

    fn anchor(&self) -> AuditResult<String> {
        Ok(self.lock()?.anchor.clone())
    }

    fn cleanup(&self, cutoff: DateTime<Utc>) -> AuditResult<usize> {
        let mut state = self.lock()?;
        let expired = state
            .events
            .iter()
            .take_while(|e| e.timestamp < cutoff)
            .count();
        if expired == 0 {
            return Ok(0);
        }

        let anchor = state.events[expired - 1].hash.clone();
        state
            .writer
            .flush()
            .map_err(|e| storage_error(&self.path, "write", e))?;

        // Anchor before the rewrite; an interrupted cleanup then fails
        // verification instead of passing with a shortened chain.
        fs::write(&self.anchor_path, format!("{}\n", anchor))
            .map_err(|e| storage_error(&self.anchor_path, "write", e))?;

        let tmp_path = sibling(&self.path, ".tmp");
        {
            let file = File::create(&tmp_path).map_err(|e| storage_error(&tmp_path, "create", e))?;
            let mut writer = BufWriter::new(file);
            write_lines(&mut writer, &state.events[expired..])?;
            writer
                .flush()
                .map_err(|e| storage_error(&tmp_path, "write", e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| storage_error(&self.path, "replace", e))?;

        state.writer = open_append(&self.path)?;
        state.events.drain(..expired);
        state.anchor = anchor;

        debug!(path = %self.path.display(), deleted = expired, "audit storage compacted");
        Ok(expired)
    }

    fn flush(&self) -> AuditResult<()> {
        self.lock()?
            .writer
            .flush()
            .map_err(|e| storage_error(&self.path, "flush", e))
    }
}
