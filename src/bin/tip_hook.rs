//! tip-hook: editor/agent hook that queues a review tip for narration.
//!
//! Reads stdin as either `{"tip": "..."}` JSON or plain text, hands it to
//! the producer and exits 0 no matter what happened, so a broken narrator
//! never blocks the caller.

use std::io::Read;

use serde::Deserialize;

use tip_narrator::config::Config;
use tip_narrator::{logging, producer};

#[derive(Deserialize)]
struct HookEvent {
    tip: Option<String>,
}

/// Pull the tip out of the hook payload.
fn parse_tip(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str::<HookEvent>(trimmed)
            .ok()
            .and_then(|e| e.tip)
            .filter(|t| !t.trim().is_empty());
    }
    Some(trimmed.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        return;
    }
    let Some(tip) = parse_tip(&input) else {
        return;
    };

    logging::init_stderr("warn");
    let config_path = Config::locate(None);
    let config = Config::load(config_path.as_deref());
    producer::submit(&config, config_path, &tip).await;
}
