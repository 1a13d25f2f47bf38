//! Daemon process lifecycle around the batch consumer.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::Config;
use crate::consumer::{BatchConsumer, ConsumerTiming};
use crate::error::Result;
use crate::identity::{HealthMarker, IdentityRecord};
use crate::narrator::Narrator;
use crate::queue::QueueStore;

/// Run the narration daemon until a signal or the idle timeout.
///
/// Only failing to write the identity record is fatal. A second daemon
/// that finds a live peer in the record exits without touching anything.
pub async fn run(config: &Config) -> Result<()> {
    if !config.enabled {
        info!("Narration disabled, daemon exiting");
        return Ok(());
    }

    let paths = config.runtime_paths();
    fs::create_dir_all(paths.root())?;

    let me = std::process::id();
    let identity = IdentityRecord::new(&paths);
    if let Some(pid) = identity.live_pid() {
        if pid != me {
            info!("Daemon already running with PID {pid}, exiting");
            return Ok(());
        }
    }
    identity.write(me)?;
    info!("Narration daemon started (PID {me}, runtime dir {})", paths.root().display());

    let shutdown = Arc::new(AtomicBool::new(false));
    listen_for_signals(shutdown.clone());

    let health = HealthMarker::new(&paths);
    let narrator = Narrator::from_config(config, None);
    let mut consumer = BatchConsumer::new(
        ConsumerTiming::from(&config.batch),
        QueueStore::new(&paths, config.locks.queue_timeout()),
        narrator,
        health.clone(),
        shutdown,
        Instant::now(),
    );
    if config.history.enabled {
        consumer = consumer.with_history(config.history.dir());
    }

    consumer.run().await;

    identity.remove_if_owned(me);
    health.remove();
    info!("Narration daemon exited");
    Ok(())
}

/// Flip `flag` on SIGTERM or SIGINT.
///
/// The SIGTERM handler is registered before this returns, so a `stop`
/// sent right after startup is not lost to the default action.
fn listen_for_signals(flag: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                None
            }
        };
        tokio::spawn(async move {
            let sigterm = async {
                match term.as_mut() {
                    Some(term) => {
                        term.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = sigterm => info!("Received SIGTERM"),
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            }
            flag.store(true, Ordering::SeqCst);
        });
    }
    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            flag.store(true, Ordering::SeqCst);
        }
    });
}
