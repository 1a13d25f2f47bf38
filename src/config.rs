//! Configuration management for tip-narrator.
//!
//! Loads config from YAML files in standard locations. Every key is
//! optional; missing keys fall back to the defaults below. Read once at
//! startup by both producers and the daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::paths::RuntimePaths;
use crate::style::Personality;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub wait_secs: f64,
    pub idle_timeout_secs: f64,
    pub poll_interval_ms: u64,
    pub health_interval_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            wait_secs: 3.0,
            idle_timeout_secs: 30.0,
            poll_interval_ms: 100,
            health_interval_secs: 5.0,
        }
    }
}

impl BatchConfig {
    pub fn wait(&self) -> Duration {
        secs(self.wait_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        secs(self.idle_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn health_interval(&self) -> Duration {
        secs(self.health_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub queue_timeout_secs: f64,
    pub playback_timeout_secs: f64,
    pub launch_timeout_secs: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            queue_timeout_secs: 5.0,
            playback_timeout_secs: 60.0,
            launch_timeout_secs: 1.0,
        }
    }
}

impl LockConfig {
    pub fn queue_timeout(&self) -> Duration {
        secs(self.queue_timeout_secs)
    }

    pub fn playback_timeout(&self) -> Duration {
        secs(self.playback_timeout_secs)
    }

    pub fn launch_timeout(&self) -> Duration {
        secs(self.launch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub max_chunk_chars: usize,
    pub voice: String,
    pub model: String,
    pub sample_rate: u32,
    /// Synthesis program and leading args; the output path is appended.
    pub synth_command: Vec<String>,
    pub synth_timeout_secs: f64,
    pub workers: usize,
    /// Player program and leading args; the audio path is appended.
    pub player: Vec<String>,
    /// Default speaking style for `say`.
    pub personality: Personality,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 380,
            voice: "expr-voice-2-m".into(),
            model: "KittenML/kitten-tts-nano-0.1".into(),
            sample_rate: 24000,
            synth_command: vec!["kitten-tts-synth".into()],
            synth_timeout_secs: 10.0,
            workers: 4,
            player: vec!["paplay".into()],
            personality: Personality::Friendly,
        }
    }
}

impl TtsConfig {
    pub fn synth_timeout(&self) -> Duration {
        secs(self.synth_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the queue, lock, pid and health files.
    pub runtime_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file; rolled files get a date suffix.
    pub file: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Rolled files kept besides the current one.
    pub backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            rotation: LogRotation::Daily,
            backups: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl HistoryConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".tip-narrator-history")
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub batch: BatchConfig,
    pub locks: LockConfig,
    pub tts: TtsConfig,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            batch: BatchConfig::default(),
            locks: LockConfig::default(),
            tts: TtsConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Find the config file to use.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./tip-narrator.yaml
    /// 2. ~/.config/tip-narrator/config.yaml
    /// 3. /etc/tip-narrator/config.yaml
    pub fn locate(path: Option<&Path>) -> Option<PathBuf> {
        path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("tip-narrator.yaml")),
                dirs::home_dir().map(|h| h.join(".config/tip-narrator/config.yaml")),
                Some(PathBuf::from("/etc/tip-narrator/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        })
    }

    /// Load configuration from YAML, falling back to defaults on any error.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(config_path) = Self::locate(path) else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    pub fn runtime_paths(&self) -> RuntimePaths {
        match &self.paths.runtime_dir {
            Some(dir) => RuntimePaths::new(dir),
            None => RuntimePaths::default(),
        }
    }
}

/// Seconds from config to a `Duration`; negative or non-finite values clamp to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}
