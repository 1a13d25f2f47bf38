//! Well-known file locations shared by producers and the daemon.

use std::path::{Path, PathBuf};

const QUEUE_FILE: &str = "tip_narrator_queue.json";
const QUEUE_LOCK_FILE: &str = "tip_narrator_queue.lock";
const PLAYBACK_LOCK_FILE: &str = "tip_narrator_audio.lock";
const LAUNCH_LOCK_FILE: &str = "tip_narrator_launch.lock";
const PID_FILE: &str = "tip_narrator.pid";
const HEALTH_FILE: &str = "tip_narrator.health";
const LOG_FILE: &str = "tip_narrator.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    root: PathBuf,
}

impl RuntimePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue(&self) -> PathBuf {
        self.root.join(QUEUE_FILE)
    }

    pub fn queue_lock(&self) -> PathBuf {
        self.root.join(QUEUE_LOCK_FILE)
    }

    pub fn playback_lock(&self) -> PathBuf {
        self.root.join(PLAYBACK_LOCK_FILE)
    }

    pub fn launch_lock(&self) -> PathBuf {
        self.root.join(LAUNCH_LOCK_FILE)
    }

    pub fn pid(&self) -> PathBuf {
        self.root.join(PID_FILE)
    }

    pub fn health(&self) -> PathBuf {
        self.root.join(HEALTH_FILE)
    }

    /// Default daemon log location.
    pub fn log(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}
