//! Speaking styles for direct narration: personalities, announcement
//! tones and the code-review voice.

use clap::ValueEnum;
use serde::Deserialize;

/// Voice used for code-review feedback.
pub const REVIEW_VOICE: &str = "expr-voice-2-m";

const GRIZZLED_OPENERS: [&str; 2] = ["Kid,", "Listen,"];
const PAUSE_CUE: &str = ".....";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    #[default]
    Friendly,
    Grizzled,
    Professional,
    Zen,
}

impl Personality {
    /// Rewrite `text` in this personality's manner. Blank text stays blank.
    pub fn apply(self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match self {
            Self::Friendly => text.to_string(),
            Self::Grizzled => {
                let mut out = if GRIZZLED_OPENERS.iter().any(|o| text.starts_with(o)) {
                    text.to_string()
                } else {
                    format!("Listen kid, {text}")
                };
                if !out.ends_with(PAUSE_CUE) {
                    out.push_str(PAUSE_CUE);
                }
                out
            }
            Self::Professional => format!("Please note: {text}"),
            Self::Zen => format!("Consider this: {text}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Warning,
    #[default]
    Info,
    Error,
}

impl Tone {
    fn prefix(self) -> &'static str {
        match self {
            Self::Success => "Great news!",
            Self::Warning => "Heads up:",
            Self::Info => "Just so you know,",
            Self::Error => "Oh no!",
        }
    }

    /// Voice for this tone; `Info` keeps the configured one.
    pub fn voice(self, configured: &str) -> String {
        match self {
            Self::Success => "expr-voice-3-f".into(),
            Self::Warning => "expr-voice-4-m".into(),
            Self::Info => configured.into(),
            Self::Error => "expr-voice-5-m".into(),
        }
    }

    /// Announcement text: tone prefix, message, long trailing pause.
    pub fn announce(self, message: &str) -> String {
        format!("{} {message}......", self.prefix())
    }
}

/// Code-review feedback is always spoken grizzled.
pub fn review(feedback: &str) -> String {
    Personality::Grizzled.apply(feedback)
}
