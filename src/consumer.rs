//! Batch consumer: the daemon's state machine.
//!
//! IDLE → COLLECTING → ATTEMPTING → IDLE, or back to COLLECTING with a
//! fresh start time when nothing could be played. SHUTDOWN is terminal and
//! is reached on a signal or after sitting idle past the idle timeout.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::history::{save_record, NarrationRecord};
use crate::identity::HealthMarker;
use crate::message::compose;
use crate::narrator::Narrator;
use crate::queue::QueueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Collecting,
    Attempting,
    Shutdown,
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Collecting => write!(f, "COLLECTING"),
            Self::Attempting => write!(f, "ATTEMPTING"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumerTiming {
    pub batch_wait: Duration,
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    pub health_interval: Duration,
}

impl From<&BatchConfig> for ConsumerTiming {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_wait: config.wait(),
            idle_timeout: config.idle_timeout(),
            poll_interval: config.poll_interval(),
            health_interval: config.health_interval(),
        }
    }
}

/// Tips being accumulated for one narration.
#[derive(Debug)]
struct Batch {
    tips: Vec<String>,
    started_at: Instant,
}

pub struct BatchConsumer {
    timing: ConsumerTiming,
    queue: QueueStore,
    narrator: Narrator,
    health: HealthMarker,
    history_dir: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    state: ConsumerState,
    batch: Option<Batch>,
    last_activity: Instant,
    last_health: Instant,
}

impl BatchConsumer {
    pub fn new(
        timing: ConsumerTiming,
        queue: QueueStore,
        narrator: Narrator,
        health: HealthMarker,
        shutdown: Arc<AtomicBool>,
        now: Instant,
    ) -> Self {
        Self {
            timing,
            queue,
            narrator,
            health,
            history_dir: None,
            shutdown,
            state: ConsumerState::Idle,
            batch: None,
            last_activity: now,
            last_health: now,
        }
    }

    /// Record every narration attempt under `dir`.
    pub fn with_history(mut self, dir: PathBuf) -> Self {
        self.history_dir = Some(dir);
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Tips of the open batch, if any.
    pub fn pending(&self) -> &[String] {
        self.batch.as_ref().map_or(&[], |b| b.tips.as_slice())
    }

    /// Poll until SHUTDOWN.
    pub async fn run(mut self) {
        if let Err(e) = self.health.touch() {
            warn!("Failed to write health marker: {e}");
        }
        info!("Consumer ready, state: {}", self.state);

        let mut poll = tokio::time::interval(self.timing.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            poll.tick().await;
            if self.tick(Instant::now()).await == ConsumerState::Shutdown {
                break;
            }
        }
        info!("Consumer stopped");
    }

    /// One poll iteration at time `now`.
    pub async fn tick(&mut self, now: Instant) -> ConsumerState {
        if self.state == ConsumerState::Shutdown {
            return self.state;
        }

        if now.saturating_duration_since(self.last_health) >= self.timing.health_interval {
            self.refresh_health(now);
        }

        if self.shutdown.load(Ordering::SeqCst) {
            if !self.pending().is_empty() {
                info!("Shutting down with {} unplayed tip(s)", self.pending().len());
            }
            return self.transition(ConsumerState::Shutdown);
        }

        if self.batch.is_none() {
            if now.saturating_duration_since(self.last_activity) > self.timing.idle_timeout {
                info!("Idle for {:?}, shutting down", self.timing.idle_timeout);
                return self.transition(ConsumerState::Shutdown);
            }

            let tips = self.queue.drain_snapshot().await;
            if !tips.is_empty() {
                info!("Drained {} tip(s)", tips.len());
                self.batch = Some(Batch {
                    tips,
                    started_at: now,
                });
                self.last_activity = now;
                self.transition(ConsumerState::Collecting);
            }
        }

        let ready = self
            .batch
            .as_ref()
            .is_some_and(|b| now.saturating_duration_since(b.started_at) >= self.timing.batch_wait);
        if ready {
            self.attempt(now).await;
        }

        self.state
    }

    async fn attempt(&mut self, now: Instant) {
        let Some(batch) = self.batch.as_ref() else {
            return;
        };
        let tips = batch.tips.clone();
        self.transition(ConsumerState::Attempting);

        let t0 = Instant::now();
        let message = compose(&tips);
        let outcome = self.narrator.narrate(&message).await;
        let elapsed = t0.elapsed();
        let finished = now + elapsed;
        // Waiting for the speaker and playing can outlast the health interval.
        self.refresh_health(finished);

        if let Some(dir) = &self.history_dir {
            let record = NarrationRecord::new(
                "batch",
                tips.len(),
                &message,
                &outcome,
                elapsed.as_secs_f64() * 1000.0,
            );
            save_record(dir, &record);
        }

        self.last_activity = finished;
        if outcome.succeeded() {
            self.batch = None;
            self.transition(ConsumerState::Idle);
        } else {
            warn!(
                "Batch of {} tip(s) not played, retrying in {:?}",
                tips.len(),
                self.timing.batch_wait
            );
            if let Some(batch) = self.batch.as_mut() {
                batch.started_at = finished;
            }
            self.transition(ConsumerState::Collecting);
        }
    }

    fn refresh_health(&mut self, now: Instant) {
        if let Err(e) = self.health.touch() {
            warn!("Failed to refresh health marker: {e}");
        }
        self.last_health = now;
    }

    fn transition(&mut self, next: ConsumerState) -> ConsumerState {
        if self.state != next {
            debug!("State: {} → {}", self.state, next);
            self.state = next;
        }
        self.state
    }
}
