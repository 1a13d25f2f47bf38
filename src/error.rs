//! Error taxonomy for the narration pipeline.
//!
//! None of these reach a producer's caller: lock timeouts degrade to a
//! no-op, corrupt state resets to empty, collaborator failures are counted
//! per chunk and stale identities are ignored.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NarratorError {
    /// An advisory lock could not be acquired within its budget.
    #[error("timed out waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf },

    /// The queue file exists but could not be parsed.
    #[error("corrupt state in {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// The synthesis or playback subprocess failed or timed out.
    #[error("{stage} failed: {reason}")]
    CollaboratorFailure { stage: &'static str, reason: String },

    /// The identity file names a process that is no longer alive.
    #[error("daemon pid {pid} is not running")]
    StaleIdentity { pid: u32 },

    /// No identity file exists.
    #[error("daemon is not running")]
    NotRunning,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NarratorError {
    pub(crate) fn synthesis(reason: impl Into<String>) -> Self {
        Self::CollaboratorFailure {
            stage: "synthesis",
            reason: reason.into(),
        }
    }

    pub(crate) fn playback(reason: impl Into<String>) -> Self {
        Self::CollaboratorFailure {
            stage: "playback",
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = NarratorError> = std::result::Result<T, E>;
