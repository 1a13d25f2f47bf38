//! Daemon identity (PID file) and health marker.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::{NarratorError, Result};
use crate::paths::RuntimePaths;

/// Check if a PID exists using the null signal.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // Exists but owned by someone else
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    false
}

/// PID file naming the running daemon.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    path: PathBuf,
}

impl IdentityRecord {
    pub fn new(paths: &RuntimePaths) -> Self {
        Self { path: paths.pid() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of a live daemon, or why there is none.
    pub fn read(&self) -> Result<u32> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(NarratorError::NotRunning),
            Err(e) => return Err(e.into()),
        };
        let pid: u32 = contents
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| NarratorError::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if pid_alive(pid) {
            Ok(pid)
        } else {
            Err(NarratorError::StaleIdentity { pid })
        }
    }

    /// Live daemon PID; stale, corrupt and missing records all read as `None`.
    pub fn live_pid(&self) -> Option<u32> {
        match self.read() {
            Ok(pid) => Some(pid),
            Err(NarratorError::NotRunning) => None,
            Err(e) => {
                debug!("Ignoring identity record: {e}");
                None
            }
        }
    }

    /// Write `pid` via a private temp file + rename.
    ///
    /// The launcher and a freshly started daemon both write the record, so
    /// every writer gets its own temp file in the same directory.
    pub fn write(&self, pid: u32) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".tip_narrator_pid")
            .tempfile_in(dir)?;
        write!(tmp, "{pid}")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Remove the record only if it still names `pid`.
    pub fn remove_if_owned(&self, pid: u32) {
        let owned = fs::read_to_string(&self.path)
            .ok()
            .and_then(|c| c.trim().parse::<u32>().ok())
            == Some(pid);
        if owned {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// File whose mtime is the daemon's heartbeat.
#[derive(Debug, Clone)]
pub struct HealthMarker {
    path: PathBuf,
}

impl HealthMarker {
    pub fn new(paths: &RuntimePaths) -> Self {
        Self {
            path: paths.health(),
        }
    }

    pub fn touch(&self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)?;
        file.set_modified(SystemTime::now())
    }

    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }

    /// Time since the last heartbeat, if the marker exists.
    pub fn age(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(modified.elapsed().unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_alive_for_self() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn pid_alive_false_for_impossible_pids() {
        assert!(!pid_alive(0));
        assert!(!pid_alive(u32::MAX));
        assert!(!pid_alive(999_999_999));
    }

    #[test]
    fn missing_record_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));
        assert!(matches!(identity.read(), Err(NarratorError::NotRunning)));
        assert_eq!(identity.live_pid(), None);
    }

    #[test]
    fn live_record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));
        identity.write(std::process::id()).unwrap();
        assert_eq!(identity.live_pid(), Some(std::process::id()));
        assert_eq!(
            fs::read_to_string(identity.path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn dead_pid_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        identity.write(pid).unwrap();
        assert!(matches!(identity.read(), Err(NarratorError::StaleIdentity { .. })));
        assert_eq!(identity.live_pid(), None);
    }

    #[test]
    fn garbage_record_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));
        fs::write(identity.path(), "not-a-pid").unwrap();
        assert!(matches!(identity.read(), Err(NarratorError::CorruptState { .. })));
        assert_eq!(identity.live_pid(), None);
    }

    #[test]
    fn concurrent_writers_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));

        let writers: Vec<_> = [1111u32, 2222]
            .into_iter()
            .map(|pid| {
                let identity = identity.clone();
                std::thread::spawn(move || {
                    (0..1000).filter(|_| identity.write(pid).is_err()).count()
                })
            })
            .collect();
        for writer in writers {
            assert_eq!(writer.join().unwrap(), 0);
        }

        let last: u32 = fs::read_to_string(identity.path()).unwrap().trim().parse().unwrap();
        assert!(last == 1111 || last == 2222);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temp files left behind");
    }

    #[test]
    fn remove_only_when_owned() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityRecord::new(&RuntimePaths::new(dir.path()));
        identity.write(4242).unwrap();

        identity.remove_if_owned(1111);
        assert!(identity.path().exists());
        identity.remove_if_owned(4242);
        assert!(!identity.path().exists());
    }

    #[test]
    fn health_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let marker = HealthMarker::new(&RuntimePaths::new(dir.path()));
        assert!(marker.age().is_none());

        marker.touch().unwrap();
        assert!(marker.age().unwrap() < Duration::from_secs(5));

        marker.remove();
        assert!(marker.age().is_none());
    }
}
