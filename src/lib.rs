//! tip-narrator: batched spoken code-review tips for Linux.
//!
//! Short-lived producers append tips to a shared on-disk queue and make
//! sure a single narration daemon is running. The daemon batches tips for
//! a few seconds, turns each batch into one message, synthesizes it in
//! parallel chunks and plays them in order under a machine-wide playback
//! lock.

pub mod config;
pub mod consumer;
pub mod daemon;
pub mod error;
pub mod history;
pub mod identity;
pub mod launcher;
pub mod lock;
pub mod logging;
pub mod message;
pub mod narrator;
pub mod paths;
pub mod playback;
pub mod producer;
pub mod queue;
pub mod segment;
pub mod speech;
pub mod style;

pub use config::Config;
pub use error::{NarratorError, Result};
