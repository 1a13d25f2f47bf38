//! tip-narrator: spoken code-review tips with a singleton narration daemon.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tip_narrator::config::Config;
use tip_narrator::error::NarratorError;
use tip_narrator::history::{self, NarrationRecord};
use tip_narrator::identity::{HealthMarker, IdentityRecord};
use tip_narrator::narrator::Narrator;
use tip_narrator::playback::PlaybackMutex;
use tip_narrator::producer::{self, Submission};
use tip_narrator::queue::QueueStore;
use tip_narrator::style::{self, Personality, Tone};
use tip_narrator::{daemon, logging};

#[derive(Parser, Debug)]
#[command(name = "tip-narrator", about = "Batched spoken code-review tips")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the narration daemon in the foreground
    Daemon,
    /// Queue a tip, starting the daemon if needed
    Push { tip: String },
    /// Speak text now, bypassing the queue
    Say {
        text: String,
        /// Override the configured voice
        #[arg(long)]
        voice: Option<String>,
        /// Speaking style (default: tts.personality from config)
        #[arg(long, value_enum)]
        personality: Option<Personality>,
    },
    /// Speak an announcement with a tone-specific prefix and voice
    Announce {
        message: String,
        #[arg(long, value_enum, default_value_t = Tone::Info)]
        tone: Tone,
    },
    /// Speak code-review feedback in the grizzled reviewer voice
    Review { feedback: String },
    /// Show daemon, queue and playback state
    Status,
    /// Ask the running daemon to shut down
    Stop,
    /// Print the narration report for a day (default: today)
    Report {
        date: Option<String>,
        /// List days with recorded narrations instead
        #[arg(long)]
        list: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = Config::locate(args.config.as_deref());
    let config = Config::load(config_path.as_deref());
    let level = logging::level(args.verbose);

    // Held until exit so the non-blocking file writer flushes.
    let _log_guard = if matches!(args.command, Command::Daemon) {
        let log = config
            .logging
            .file
            .clone()
            .unwrap_or_else(|| config.runtime_paths().log());
        Some(logging::init_file(level, &log, &config.logging)?)
    } else {
        match &config.logging.file {
            Some(file) => Some(logging::init_file(level, file, &config.logging)?),
            None => {
                logging::init_stderr(level);
                None
            }
        }
    };
    if let Some(path) = &config_path {
        info!("Using config {}", path.display());
    }

    match args.command {
        Command::Daemon => daemon::run(&config).await?,
        Command::Push { tip } => {
            let result = producer::submit(&config, config_path, &tip).await;
            if result == Submission::Dropped {
                warn!("Tip was not queued");
            }
        }
        Command::Say {
            text,
            voice,
            personality,
        } => {
            let text = personality.unwrap_or(config.tts.personality).apply(&text);
            speak(&config, "say", &text, voice.as_deref()).await;
        }
        Command::Announce { message, tone } => {
            let voice = tone.voice(&config.tts.voice);
            speak(&config, "announce", &tone.announce(&message), Some(&voice)).await;
        }
        Command::Review { feedback } => {
            speak(&config, "review", &style::review(&feedback), Some(style::REVIEW_VOICE)).await;
        }
        Command::Status => status(&config).await,
        Command::Stop => stop(&config)?,
        Command::Report { date, list } => {
            let dir = config.history.dir();
            if list {
                for day in history::list_dates(&dir) {
                    println!("{day}");
                }
            } else {
                let date = date.unwrap_or_else(history::today);
                println!("{}", history::generate_report(&dir, &date));
            }
        }
    }

    Ok(())
}

/// Narrate `text` directly, bypassing the queue.
async fn speak(config: &Config, source: &str, text: &str, voice: Option<&str>) {
    if text.trim().is_empty() {
        println!("No text provided to speak");
        return;
    }
    let narrator = Narrator::from_config(config, voice);
    let t0 = Instant::now();
    let outcome = narrator.narrate(text).await;

    if config.history.enabled {
        let record = NarrationRecord::new(
            source,
            0,
            text,
            &outcome,
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        history::save_record(&config.history.dir(), &record);
    }

    if outcome.lock_timed_out {
        println!("Speaker busy, nothing played");
    } else {
        println!("Played {}/{} chunk(s)", outcome.played, outcome.chunks);
    }
}

async fn status(config: &Config) {
    let paths = config.runtime_paths();
    println!("Runtime dir: {}", paths.root().display());

    match IdentityRecord::new(&paths).read() {
        Ok(pid) => println!("Daemon: running (PID {pid})"),
        Err(NarratorError::NotRunning) => println!("Daemon: not running"),
        Err(e) => println!("Daemon: not running ({e})"),
    }

    match HealthMarker::new(&paths).age() {
        Some(age) => println!("Last heartbeat: {:.1}s ago", age.as_secs_f64()),
        None => println!("Last heartbeat: none"),
    }

    match QueueStore::new(&paths, config.locks.queue_timeout()).pending().await {
        Some(record) => println!("Queued tips: {}", record.tips.len()),
        None => println!("Queued tips: unknown (queue locked)"),
    }

    let playing = PlaybackMutex::new(&paths, config.locks.playback_timeout()).is_playing();
    println!("Playing: {}", if playing { "yes" } else { "no" });
}

fn stop(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let identity = IdentityRecord::new(&config.runtime_paths());
    let pid = match identity.read() {
        Ok(pid) => pid,
        Err(NarratorError::NotRunning | NarratorError::StaleIdentity { .. }) => {
            println!("Daemon is not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)?;
        kill(Pid::from_raw(raw), Signal::SIGTERM)?;
        println!("Sent SIGTERM to daemon (PID {pid})");
    }
    #[cfg(not(unix))]
    {
        println!("Stopping the daemon (PID {pid}) is only supported on Unix");
    }
    Ok(())
}
