//! Singleton daemon launcher.
//!
//! Fast path: a live PID in the identity record means a daemon is already
//! running. Otherwise a short launch lock serializes competing producers,
//! and the record is checked again under the lock before anything is
//! spawned, so concurrent producers start at most one daemon.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::identity::IdentityRecord;
use crate::lock::FileLock;
use crate::paths::RuntimePaths;

const NARRATOR_BIN: &str = "tip-narrator";

/// Starts a detached daemon process and returns its PID.
pub trait DaemonSpawner: Send + Sync {
    fn spawn(&self) -> io::Result<u32>;
}

/// Runs the narrator binary as `tip-narrator [--config <path>] daemon`
/// in a new session with no inherited standard streams.
pub struct ExeSpawner {
    config_path: Option<PathBuf>,
}

impl ExeSpawner {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(narrator_exe());
        if let Some(config) = &self.config_path {
            cmd.arg("--config").arg(config);
        }
        cmd.arg("daemon")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: the hook only calls setsid(2), which is async-signal-safe.
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(io::Error::from)
                });
            }
        }
        cmd
    }
}

/// The `tip-narrator` binary: this executable, a sibling of it (when
/// running as `tip-hook`), or whatever `PATH` resolves.
fn narrator_exe() -> PathBuf {
    let Ok(exe) = std::env::current_exe() else {
        return PathBuf::from(NARRATOR_BIN);
    };
    if exe.file_stem().is_some_and(|s| s == NARRATOR_BIN) {
        return exe;
    }
    exe.parent()
        .map(|dir| dir.join(NARRATOR_BIN).with_extension(std::env::consts::EXE_EXTENSION))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(NARRATOR_BIN))
}

impl DaemonSpawner for ExeSpawner {
    fn spawn(&self) -> io::Result<u32> {
        // The child is never waited on; it outlives this process.
        let child = self.command().spawn()?;
        Ok(child.id())
    }
}

pub struct DaemonLauncher {
    identity: IdentityRecord,
    launch_lock: PathBuf,
    lock_timeout: Duration,
    spawner: Arc<dyn DaemonSpawner>,
}

impl DaemonLauncher {
    pub fn new(paths: &RuntimePaths, lock_timeout: Duration, spawner: Arc<dyn DaemonSpawner>) -> Self {
        Self {
            identity: IdentityRecord::new(paths),
            launch_lock: paths.launch_lock(),
            lock_timeout,
            spawner,
        }
    }

    /// Make sure a daemon is running and return its PID if known.
    pub async fn ensure_running(&self) -> Option<u32> {
        if let Some(pid) = self.identity.live_pid() {
            return Some(pid);
        }

        let Some(lock) = FileLock::acquire(&self.launch_lock, self.lock_timeout).await else {
            debug!("Launch lock busy, assuming another producer is starting the daemon");
            return self.identity.live_pid();
        };

        // Re-check: the holder before us may have just launched one.
        let result = match self.identity.live_pid() {
            Some(pid) => Some(pid),
            None => self.launch(),
        };
        lock.release();
        result
    }

    fn launch(&self) -> Option<u32> {
        let pid = match self.spawner.spawn() {
            Ok(pid) => pid,
            Err(e) => {
                warn!("Failed to start narration daemon: {e}");
                return None;
            }
        };
        if let Err(e) = self.identity.write(pid) {
            warn!("Daemon {pid} started but its pid file could not be written: {e}");
        }
        info!("Narration daemon started with PID {pid}");
        Some(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pretends to spawn by handing out this test process's PID.
    #[derive(Default)]
    struct CountingSpawner {
        spawned: AtomicUsize,
        fail: bool,
    }

    impl DaemonSpawner for CountingSpawner {
        fn spawn(&self) -> io::Result<u32> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no binary"));
            }
            self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(std::process::id())
        }
    }

    fn launcher(paths: &RuntimePaths, spawner: Arc<CountingSpawner>) -> DaemonLauncher {
        DaemonLauncher::new(paths, Duration::from_millis(300), spawner)
    }

    #[tokio::test]
    async fn spawns_and_records_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        let spawner = Arc::new(CountingSpawner::default());

        let pid = launcher(&paths, spawner.clone()).ensure_running().await;
        assert_eq!(pid, Some(std::process::id()));
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 1);
        assert_eq!(IdentityRecord::new(&paths).live_pid(), pid);
    }

    #[tokio::test]
    async fn live_daemon_takes_fast_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        IdentityRecord::new(&paths).write(std::process::id()).unwrap();
        // Fast path must not need the launch lock.
        let _held = FileLock::acquire(&paths.launch_lock(), Duration::ZERO)
            .await
            .unwrap();
        let spawner = Arc::new(CountingSpawner::default());

        let pid = launcher(&paths, spawner.clone()).ensure_running().await;
        assert_eq!(pid, Some(std::process::id()));
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_record_does_not_block_launch() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        let mut dead = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = dead.id();
        dead.wait().unwrap();
        IdentityRecord::new(&paths).write(dead_pid).unwrap();
        let spawner = Arc::new(CountingSpawner::default());

        let pid = launcher(&paths, spawner.clone()).ensure_running().await;
        assert_eq!(pid, Some(std::process::id()));
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_launch_lock_defers_to_other_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        let _held = FileLock::acquire(&paths.launch_lock(), Duration::ZERO)
            .await
            .unwrap();
        let spawner = Arc::new(CountingSpawner::default());

        assert_eq!(launcher(&paths, spawner.clone()).ensure_running().await, None);
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        let spawner = Arc::new(CountingSpawner {
            fail: true,
            ..CountingSpawner::default()
        });

        assert_eq!(launcher(&paths, spawner).ensure_running().await, None);
        assert!(!paths.pid().exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_launch_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RuntimePaths::new(dir.path());
        let spawner = Arc::new(CountingSpawner::default());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let paths = paths.clone();
            let spawner = spawner.clone();
            tasks.push(tokio::spawn(async move {
                DaemonLauncher::new(&paths, Duration::from_secs(5), spawner)
                    .ensure_running()
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(std::process::id()));
        }
        assert_eq!(spawner.spawned.load(Ordering::SeqCst), 1);
    }
}
