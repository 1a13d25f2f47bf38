//! Fire-and-forget tip submission used by hooks and the `push` command.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::launcher::{DaemonLauncher, DaemonSpawner, ExeSpawner};
use crate::queue::QueueStore;

/// What happened to a submitted tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    Skipped,
    Dropped,
}

/// Queue `tip` for narration, starting the daemon if needed.
///
/// Never fails: an empty tip or a disabled config is skipped, and a busy
/// queue lock drops the tip with a warning.
pub async fn submit(config: &Config, config_path: Option<PathBuf>, tip: &str) -> Submission {
    submit_with(config, Arc::new(ExeSpawner::new(config_path)), tip).await
}

pub async fn submit_with(config: &Config, spawner: Arc<dyn DaemonSpawner>, tip: &str) -> Submission {
    let tip = tip.trim();
    if tip.is_empty() || !config.enabled {
        return Submission::Skipped;
    }

    let paths = config.runtime_paths();
    if let Err(e) = std::fs::create_dir_all(paths.root()) {
        warn!("Cannot create runtime dir {}: {e}", paths.root().display());
        return Submission::Dropped;
    }

    let launcher = DaemonLauncher::new(&paths, config.locks.launch_timeout(), spawner);
    match launcher.ensure_running().await {
        Some(pid) => debug!("Daemon running with PID {pid}"),
        None => debug!("Daemon not confirmed, queueing anyway"),
    }

    match QueueStore::new(&paths, config.locks.queue_timeout()).append(tip).await {
        Ok(()) => Submission::Queued,
        Err(e) => {
            warn!("Tip dropped: {e}");
            Submission::Dropped
        }
    }
}
