use thiserror::Error;

use crate::playback::PlaybackState;

/// Errors surfaced by the playback worker and still-image analysis.
#[derive(Error, Debug)]
pub enum ClasswatchError {
    #[error("cannot open source '{path}': {reason}")]
    InvalidSource { path: String, reason: String },
    #[error("detection failed: {0}")]
    DetectionFailed(String),
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: PlaybackState,
    },
    #[error("playback is already active")]
    AlreadyActive,
    #[error("playback worker thread panicked")]
    WorkerPanicked,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClasswatchError {
    pub(crate) fn invalid_source(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSource {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClasswatchError>;
