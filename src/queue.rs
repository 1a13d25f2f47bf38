//! Durable tip queue shared by producers and the daemon.
//!
//! The whole queue is one small JSON document, `{"tips": [...],
//! "last_update": <epoch secs>}`, rewritten wholesale through a temp file
//! and a rename. `load` and `save` do no locking themselves; the composite
//! operations below wrap them in the queue lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NarratorError, Result};
use crate::lock::FileLock;
use crate::paths::RuntimePaths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueRecord {
    pub tips: Vec<String>,
    pub last_update: f64,
}

impl QueueRecord {
    /// An empty record stamped with the current time.
    pub fn cleared() -> Self {
        Self {
            tips: Vec::new(),
            last_update: epoch_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl QueueStore {
    pub fn new(paths: &RuntimePaths, lock_timeout: Duration) -> Self {
        Self {
            path: paths.queue(),
            lock_path: paths.queue_lock(),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record. Missing or corrupt files read as empty.
    pub fn load(&self) -> QueueRecord {
        match self.try_load() {
            Ok(record) => record,
            Err(NarratorError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                QueueRecord::default()
            }
            Err(e) => {
                warn!("Resetting queue: {e}");
                QueueRecord::default()
            }
        }
    }

    fn try_load(&self) -> Result<QueueRecord> {
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| NarratorError::CorruptState {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Persist `record` so readers see either the old or the new file.
    pub fn save(&self, record: &QueueRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Append one tip under the queue lock.
    ///
    /// Fails with `LockTimeout` if the lock is busy for longer than the
    /// configured timeout; the tip is then dropped.
    pub async fn append(&self, tip: &str) -> Result<()> {
        let Some(lock) = FileLock::acquire(&self.lock_path, self.lock_timeout).await else {
            return Err(NarratorError::LockTimeout {
                path: self.lock_path.clone(),
            });
        };

        let mut record = self.load();
        record.tips.push(tip.to_string());
        record.last_update = epoch_secs();
        let result = self.save(&record);
        lock.release();

        if result.is_ok() {
            debug!("Queued tip ({} pending)", record.tips.len());
        }
        result
    }

    /// Atomically take every queued tip, leaving the queue empty.
    ///
    /// Returns an empty list when the lock is busy or nothing is queued.
    pub async fn drain_snapshot(&self) -> Vec<String> {
        let Some(lock) = FileLock::acquire(&self.lock_path, self.lock_timeout).await else {
            debug!("Queue lock busy, skipping drain");
            return Vec::new();
        };

        let record = self.load();
        let tips = if record.tips.is_empty() {
            Vec::new()
        } else {
            match self.save(&QueueRecord::cleared()) {
                Ok(()) => record.tips,
                Err(e) => {
                    // Tips stay queued; returning them would narrate them twice.
                    warn!("Failed to clear queue: {e}");
                    Vec::new()
                }
            }
        };
        lock.release();
        tips
    }

    /// Locked read of the current record, for status reporting.
    pub async fn pending(&self) -> Option<QueueRecord> {
        let lock = FileLock::acquire(&self.lock_path, self.lock_timeout).await?;
        let record = self.load();
        lock.release();
        Some(record)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
