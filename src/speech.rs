//! External speech collaborators: synthesis and playback subprocesses.
//!
//! Both are opaque to the narrator: synthesis turns text into a temporary
//! audio file within a hard deadline, playback renders a file to the
//! speaker and runs to completion.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::TtsConfig;
use crate::error::{NarratorError, Result};

/// Text → audio file. The returned path is deleted when dropped.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, index: usize) -> Result<TempPath>;
}

/// Audio file → speaker, synchronously.
#[async_trait]
pub trait Player: Send + Sync {
    async fn play(&self, audio: &Path) -> Result<()>;
}

/// Parameters handed to the synthesis program on stdin.
#[derive(Serialize)]
struct SynthRequest<'a> {
    text: &'a str,
    voice: &'a str,
    model: &'a str,
    sample_rate: u32,
}

/// Runs the configured synthesis command with the output path appended
/// and a JSON request on stdin.
pub struct CommandSynthesizer {
    command: Vec<String>,
    voice: String,
    model: String,
    sample_rate: u32,
    timeout: Duration,
}

impl CommandSynthesizer {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            command: config.synth_command.clone(),
            voice: config.voice.clone(),
            model: config.model.clone(),
            sample_rate: config.sample_rate,
            timeout: config.synth_timeout(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, index: usize) -> Result<TempPath> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| NarratorError::synthesis("synth_command is empty"))?;

        let audio = tempfile::Builder::new()
            .prefix("tip_narrator_")
            .suffix(&format!("_{index}.wav"))
            .tempfile()?
            .into_temp_path();

        let payload = serde_json::to_vec(&SynthRequest {
            text,
            voice: &self.voice,
            model: &self.model,
            sample_rate: self.sample_rate,
        })?;

        let t0 = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .arg(&audio)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NarratorError::synthesis(format!("cannot spawn {program}: {e}")))?;

        let run = async {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Synthesizer did not read its request: {e}");
                }
            }
            child.wait().await
        };

        // On timeout the child is killed when `child` drops.
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(status)) if status.success() => {
                debug!("Chunk {index} synthesized in {}ms", t0.elapsed().as_millis());
                Ok(audio)
            }
            Ok(Ok(status)) => Err(NarratorError::synthesis(format!("{program} exited with {status}"))),
            Ok(Err(e)) => Err(NarratorError::synthesis(e.to_string())),
            Err(_) => Err(NarratorError::synthesis(format!(
                "{program} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

/// Runs the configured player with the audio path appended. No timeout.
pub struct CommandPlayer {
    command: Vec<String>,
}

impl CommandPlayer {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            command: config.player.clone(),
        }
    }
}

#[async_trait]
impl Player for CommandPlayer {
    async fn play(&self, audio: &Path) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| NarratorError::playback("player is empty"))?;

        let status = Command::new(program)
            .args(args)
            .arg(audio)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| NarratorError::playback(format!("cannot spawn {program}: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(NarratorError::playback(format!("{program} exited with {status}")))
        }
    }
}
