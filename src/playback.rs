//! Playback mutex: serializes audio output across every narrator process.

use std::path::PathBuf;
use std::time::Duration;

use crate::lock::FileLock;
use crate::paths::RuntimePaths;

#[derive(Debug, Clone)]
pub struct PlaybackMutex {
    path: PathBuf,
    timeout: Duration,
}

impl PlaybackMutex {
    pub fn new(paths: &RuntimePaths, timeout: Duration) -> Self {
        Self {
            path: paths.playback_lock(),
            timeout,
        }
    }

    /// Wait up to the configured timeout for exclusive use of the speaker.
    pub async fn acquire(&self) -> Option<FileLock> {
        FileLock::acquire(&self.path, self.timeout).await
    }

    /// Whether some narrator is playing audio right now.
    pub fn is_playing(&self) -> bool {
        FileLock::is_held(&self.path)
    }

    /// Block until current playback finishes (or the timeout passes).
    /// Returns `false` on timeout.
    pub async fn wait_idle(&self) -> bool {
        match self.acquire().await {
            Some(lock) => {
                lock.release();
                true
            }
            None => false,
        }
    }
}
