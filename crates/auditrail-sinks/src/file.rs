//! Rotating JSON-lines file destination.
//!
//! Each event is written as one JSON object per line.  Before a batch is
//! appended the active file is rotated if it has reached
//! `max_file_size`, or (with `rotate_daily`) if it was last written on an
//! earlier UTC day:
//!
//!   audit.jsonl → audit.jsonl.1 → audit.jsonl.2 → … → audit.jsonl.<max_files>
//!
//! The oldest file beyond `max_files` is deleted.  Blocking I/O runs on
//! tokio's blocking pool.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use auditrail_contracts::{
    config::{DestinationFilter, RotationConfig},
    error::{AuditError, AuditResult},
    event::AuditEvent,
};
use auditrail_core::traits::Destination;

/// Path of the `n`th rotated file.
pub fn rotated_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Appends events to `path`, rotating per `RotationConfig`.
pub struct FileDestination {
    name: String,
    path: PathBuf,
    rotation: RotationConfig,
    filter: Option<DestinationFilter>,
    // Serializes rotation and appends across concurrent flushes.
    write_lock: Arc<Mutex<()>>,
}

impl FileDestination {
    pub fn new(path: impl Into<PathBuf>, rotation: RotationConfig) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
            rotation,
            filter: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_filter(mut self, filter: Option<DestinationFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl std::fmt::Display) -> AuditError {
        AuditError::Delivery {
            destination: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Whether the file at `path` must be rotated before the next append.
fn needs_rotation(path: &Path, rotation: &RotationConfig, now: DateTime<Utc>) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if metadata.len() >= rotation.max_file_size {
        return true;
    }
    if rotation.rotate_daily {
        if let Ok(modified) = metadata.modified() {
            let modified: DateTime<Utc> = modified.into();
            return modified.date_naive() < now.date_naive();
        }
    }
    false
}

/// Shift `path.N` to `path.N+1`, drop the oldest, and move `path` to `path.1`.
fn rotate(path: &Path, max_files: usize) -> std::io::Result<()> {
    let oldest = rotated_path(path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let from = rotated_path(path, n);
        if from.exists() {
            fs::rename(&from, rotated_path(path, n + 1))?;
        }
    }
    fs::rename(path, rotated_path(path, 1))
}

fn append(path: &Path, rotation: &RotationConfig, payload: &[u8]) -> std::io::Result<bool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let rotated = needs_rotation(path, rotation, Utc::now());
    if rotated {
        rotate(path, rotation.max_files)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(payload)?;
    file.flush()?;
    Ok(rotated)
}

#[async_trait]
impl Destination for FileDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, event: &AuditEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(event))
    }

    async fn deliver(&self, batch: &[AuditEvent]) -> AuditResult<()> {
        let mut payload = Vec::new();
        for event in batch {
            serde_json::to_writer(&mut payload, event)?;
            payload.push(b'\n');
        }

        let path = self.path.clone();
        let rotation = self.rotation.clone();
        let write_lock = Arc::clone(&self.write_lock);
        let written = tokio::task::spawn_blocking(move || {
            let _guard = write_lock
                .lock()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            append(&path, &rotation, &payload)
        })
        .await
        .map_err(|e| self.error(e))?;

        let rotated = written.map_err(|e| self.error(e))?;
        if rotated {
            info!(path = %self.path.display(), "audit file rotated");
        }
        debug!(path = %self.path.display(), events = batch.len(), "events appended");
        Ok(())
    }
}
