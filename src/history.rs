//! Narration history and reporting.
//!
//! Stores one JSON line per narration attempt in `{dir}/{date}.jsonl`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::narrator::NarrationOutcome;

fn history_file(dir: &Path, date: &str) -> PathBuf {
    dir.join(format!("{date}.jsonl"))
}

pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationRecord {
    pub timestamp: String,
    /// "batch" for daemon narrations; "say", "announce" or "review" for
    /// direct ones.
    pub source: String,
    pub tip_count: usize,
    pub message: String,
    pub chunks: usize,
    pub generated: usize,
    pub played: usize,
    pub success: bool,
    pub lock_timed_out: bool,
    pub generate_ms: i64,
    pub playback_ms: i64,
    pub total_ms: i64,
}

impl NarrationRecord {
    pub fn new(
        source: &str,
        tip_count: usize,
        message: &str,
        outcome: &NarrationOutcome,
        total_ms: f64,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            source: source.to_string(),
            tip_count,
            message: message.to_string(),
            chunks: outcome.chunks,
            generated: outcome.generated,
            played: outcome.played,
            success: outcome.succeeded(),
            lock_timed_out: outcome.lock_timed_out,
            generate_ms: outcome.generate_ms as i64,
            playback_ms: outcome.playback_ms as i64,
            total_ms: total_ms as i64,
        }
    }
}

/// Append `record` to today's file. Failures are logged, never returned.
pub fn save_record(dir: &Path, record: &NarrationRecord) {
    if let Err(e) = append_line(dir, record) {
        warn!("Failed to record narration in {}: {e}", dir.display());
    }
}

fn append_line(dir: &Path, record: &NarrationRecord) -> crate::error::Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    fs::create_dir_all(dir)?;
    // One write per record keeps concurrent appenders from interleaving.
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(history_file(dir, &today()))?
        .write_all(&line)?;
    Ok(())
}

/// Records for `date`; unreadable lines are skipped.
pub fn load_records(dir: &Path, date: &str) -> Vec<NarrationRecord> {
    let Ok(file) = fs::File::open(history_file(dir, date)) else {
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

/// Dates with a history file, oldest first.
pub fn list_dates(dir: &Path) -> Vec<String> {
    let mut dates: Vec<String> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            (path.extension()? == "jsonl")
                .then(|| path.file_stem()?.to_str().map(str::to_string))
                .flatten()
        })
        .collect();
    dates.sort();
    dates
}

/// Per-source tallies for the report.
#[derive(Default)]
struct Tally {
    attempts: usize,
    delivered: usize,
}

pub fn generate_report(dir: &Path, date: &str) -> String {
    let records = load_records(dir, date);
    if records.is_empty() {
        return format!("No narrations recorded for {date}.");
    }

    let total = records.len();
    let mut by_source: BTreeMap<&str, Tally> = BTreeMap::new();
    let (mut delivered, mut lock_timeouts, mut tips, mut chunks, mut played) = (0, 0, 0, 0, 0);
    let (mut generate_ms, mut total_ms) = (0i64, 0i64);
    for r in &records {
        let tally = by_source.entry(r.source.as_str()).or_default();
        tally.attempts += 1;
        if r.success {
            tally.delivered += 1;
            delivered += 1;
        }
        lock_timeouts += usize::from(r.lock_timed_out);
        tips += r.tip_count;
        chunks += r.chunks;
        played += r.played;
        generate_ms += r.generate_ms;
        total_ms += r.total_ms;
    }

    let mut report = format!(
        "# Narration Report for {date}\n\n\
        - Attempts: {total}\n\
        - Delivered: {delivered}\n\
        - Failed: {}\n\
        - Playback lock timeouts: {lock_timeouts}\n\
        - Tips narrated: {tips}\n\
        - Chunks played: {played}/{chunks}\n\
        - Avg synthesis time: {:.0}ms\n\
        - Avg total time: {:.0}ms\n",
        total - delivered,
        generate_ms as f64 / total as f64,
        total_ms as f64 / total as f64,
    );

    report.push_str("\n## By source\n\n");
    for (source, tally) in &by_source {
        report.push_str(&format!(
            "- {source}: {}/{} delivered\n",
            tally.delivered, tally.attempts
        ));
    }
    report
}
