//! Narration pipeline: segment → parallel synthesis → ordered playback.
//!
//! Synthesis fans out over a small worker pool and is joined before the
//! playback mutex is requested. Playback is strictly sequential in chunk
//! order, and each chunk's audio file is removed as soon as it has played.

use std::sync::Arc;
use std::time::Instant;

use tempfile::TempPath;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::playback::PlaybackMutex;
use crate::segment::segment;
use crate::speech::{CommandPlayer, CommandSynthesizer, Player, Synthesizer};

/// Result of one narration attempt with timing breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrationOutcome {
    pub chunks: usize,
    pub generated: usize,
    pub played: usize,
    pub lock_timed_out: bool,
    pub generate_ms: f64,
    pub playback_ms: f64,
}

impl NarrationOutcome {
    /// A narration counts as delivered once any chunk reached the speaker.
    pub fn succeeded(&self) -> bool {
        self.played > 0
    }
}

pub struct Narrator {
    synth: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
    playback: PlaybackMutex,
    max_chunk_chars: usize,
    workers: usize,
}

impl Narrator {
    pub fn new(
        synth: Arc<dyn Synthesizer>,
        player: Arc<dyn Player>,
        playback: PlaybackMutex,
        max_chunk_chars: usize,
        workers: usize,
    ) -> Self {
        Self {
            synth,
            player,
            playback,
            max_chunk_chars,
            workers: workers.max(1),
        }
    }

    /// Narrator backed by the configured subprocesses.
    pub fn from_config(config: &Config, voice: Option<&str>) -> Self {
        let mut synth = CommandSynthesizer::new(&config.tts);
        if let Some(voice) = voice {
            synth = synth.with_voice(voice);
        }
        Self::new(
            Arc::new(synth),
            Arc::new(CommandPlayer::new(&config.tts)),
            PlaybackMutex::new(&config.runtime_paths(), config.locks.playback_timeout()),
            config.tts.max_chunk_chars,
            config.tts.workers,
        )
    }

    pub async fn narrate(&self, text: &str) -> NarrationOutcome {
        let chunks: Vec<String> = segment(text.trim(), self.max_chunk_chars)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();

        let mut outcome = NarrationOutcome {
            chunks: chunks.len(),
            ..NarrationOutcome::default()
        };
        if chunks.is_empty() {
            return outcome;
        }

        let t_gen = Instant::now();
        let mut audio = self.synthesize_all(&chunks).await;
        outcome.generate_ms = t_gen.elapsed().as_secs_f64() * 1000.0;
        outcome.generated = audio.iter().flatten().count();

        if outcome.generated == 0 {
            warn!("No audio generated for {} chunk(s)", chunks.len());
            return outcome;
        }

        let Some(lock) = self.playback.acquire().await else {
            warn!("Playback lock busy, discarding {} audio file(s)", outcome.generated);
            outcome.lock_timed_out = true;
            return outcome;
        };

        let t_play = Instant::now();
        for (i, slot) in audio.iter_mut().enumerate() {
            let Some(path) = slot.take() else {
                continue;
            };
            match self.player.play(&path).await {
                Ok(()) => {
                    outcome.played += 1;
                    debug!("Played chunk {}/{}", i + 1, chunks.len());
                }
                Err(e) => warn!("Playback of chunk {}/{} failed: {e}", i + 1, chunks.len()),
            }
            if let Err(e) = path.close() {
                debug!("Failed to remove audio for chunk {}: {e}", i + 1);
            }
        }
        outcome.playback_ms = t_play.elapsed().as_secs_f64() * 1000.0;
        lock.release();

        info!(
            "Narrated {}/{} chunks: gen={:.0}ms play={:.0}ms",
            outcome.played, outcome.chunks, outcome.generate_ms, outcome.playback_ms
        );
        outcome
    }

    /// Synthesize every chunk with at most `workers` in flight.
    /// Slot `i` holds chunk `i`'s audio, or `None` if it failed.
    async fn synthesize_all(&self, chunks: &[String]) -> Vec<Option<TempPath>> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let synth = self.synth.clone();
            let permits = permits.clone();
            let text = chunk.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (i, synth.synthesize(&text, i).await)
            });
        }

        let mut audio: Vec<Option<TempPath>> = (0..chunks.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, Ok(path))) => audio[i] = Some(path),
                Ok((i, Err(e))) => warn!("Synthesis of chunk {}/{} failed: {e}", i + 1, chunks.len()),
                Err(e) => warn!("Synthesis task panicked: {e}"),
            }
        }
        audio
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempPath;

    use crate::error::{NarratorError, Result};
    use crate::speech::{Player, Synthesizer};

    /// Writes the chunk text into a temp file.
    #[derive(Default)]
    pub struct FakeSynth {
        pub fail_all: bool,
        pub fail_indices: HashSet<usize>,
        pub delay: Duration,
        pub created: Mutex<Vec<PathBuf>>,
        pub calls: AtomicUsize,
        pub active: AtomicUsize,
        pub max_active: AtomicUsize,
    }

    #[async_trait]
    impl Synthesizer for FakeSynth {
        async fn synthesize(&self, text: &str, index: usize) -> Result<TempPath> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_all || self.fail_indices.contains(&index) {
                return Err(NarratorError::synthesis("fake failure"));
            }
            let path = tempfile::NamedTempFile::new()?.into_temp_path();
            std::fs::write(&path, text)?;
            self.created.lock().unwrap().push(path.to_path_buf());
            Ok(path)
        }
    }

    /// Records the text of every file it plays, in order.
    #[derive(Default)]
    pub struct RecordingPlayer {
        pub fail: bool,
        pub played: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Player for RecordingPlayer {
        async fn play(&self, audio: &Path) -> Result<()> {
            if self.fail {
                return Err(NarratorError::playback("fake failure"));
            }
            let text = std::fs::read_to_string(audio)?;
            self.played.lock().unwrap().push(text);
            Ok(())
        }
    }
}
