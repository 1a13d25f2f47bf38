//! Cross-process advisory file locks.
//!
//! A lock file is opened in append mode (never truncated on open) and
//! held with an exclusive `flock`. Acquisition is non-blocking and retried
//! every 100 ms until a deadline, so no caller ever waits forever. Lock
//! files are never deleted: removing one would let two processes lock
//! different inodes under the same name.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Held exclusive lock. Released on `release()` or drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock at `path`, retrying until `timeout` elapses.
    ///
    /// Returns `None` on timeout or if the lock file cannot be opened.
    pub async fn acquire(path: &Path, timeout: Duration) -> Option<Self> {
        let file = match open_lock_file(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot open lock file {}: {e}", path.display());
                return None;
            }
        };

        let start = Instant::now();
        loop {
            if file.try_lock_exclusive().is_ok() {
                let mut lock = Self {
                    file,
                    path: path.to_path_buf(),
                };
                lock.stamp_holder();
                return Some(lock);
            }
            if start.elapsed() >= timeout {
                debug!("Gave up on lock {} after {:?}", path.display(), timeout);
                return None;
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Whether another handle currently holds the lock at `path`.
    pub fn is_held(path: &Path) -> bool {
        let Ok(file) = open_lock_file(path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and close. An unlock failure still closes the descriptor.
    pub fn release(self) {
        drop(self);
    }

    /// Holder PID for diagnostics; the lock state itself is the flock.
    fn stamp_holder(&mut self) {
        if self.file.set_len(0).is_ok() {
            let _ = writeln!(self.file, "{}", std::process::id());
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Unlock of {} failed: {e}", self.path.display());
        }
    }
}

fn open_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn acquire_creates_file_and_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");

        let lock = FileLock::acquire(&path, Duration::from_secs(1)).await;
        assert!(lock.is_some());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");

        let held = FileLock::acquire(&path, Duration::from_secs(1)).await.unwrap();
        let start = Instant::now();
        let second = FileLock::acquire(&path, Duration::from_millis(300)).await;
        assert!(second.is_none());
        assert!(start.elapsed() >= Duration::from_millis(300));

        held.release();
        assert!(FileLock::acquire(&path, Duration::ZERO).await.is_some());
    }

    #[tokio::test]
    async fn release_keeps_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");

        FileLock::acquire(&path, Duration::ZERO).await.unwrap().release();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_acquire_does_not_truncate_holder_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");

        let _held = FileLock::acquire(&path, Duration::ZERO).await.unwrap();
        assert!(FileLock::acquire(&path, Duration::ZERO).await.is_none());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[tokio::test]
    async fn is_held_reflects_lock_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lock");

        assert!(!FileLock::is_held(&path));
        let held = FileLock::acquire(&path, Duration::ZERO).await.unwrap();
        assert!(FileLock::is_held(&path));
        drop(held);
        assert!(!FileLock::is_held(&path));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_holders_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = Arc::new(dir.path().join("a.lock"));
        let inside = Arc::new(AtomicBool::new(false));
        let entries = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let path = path.clone();
            let inside = inside.clone();
            let entries = entries.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    let lock = FileLock::acquire(&path, Duration::from_secs(10))
                        .await
                        .expect("lock within timeout");
                    assert!(!inside.swap(true, Ordering::SeqCst), "two holders at once");
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.store(false, Ordering::SeqCst);
                    entries.fetch_add(1, Ordering::SeqCst);
                    lock.release();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(entries.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn unopenable_path_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("a.lock");
        assert!(FileLock::acquire(&path, Duration::ZERO).await.is_none());
    }
}
