use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelapseError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("No valid blur regions: {0}")]
    NoValidBlurRegions(String),

    #[error("Source video not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("FFmpeg not found. Please install FFmpeg or set TIMELAPSO_FFMPEG_PATH.")]
    EncoderNotFound,

    #[error("Failed to start FFmpeg: {0}")]
    EncoderSpawnFailure(String),

    #[error("FFmpeg exited with code {code:?}: {stderr_tail}")]
    EncoderExitFailure {
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Transcode cancelled")]
    Cancelled,

    #[error("A transcode for {} is already running (job {job_id})", .path.display())]
    JobAlreadyRunning { path: PathBuf, job_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid output path: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimelapseError>;

/// Wire-level classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidGeometry,
    NoValidBlurRegions,
    SourceNotFound,
    EncoderSpawnFailure,
    EncoderExitFailure,
    Cancelled,
    JobAlreadyRunning,
    InvalidInput,
    Io,
}

impl TimelapseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimelapseError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            TimelapseError::NoValidBlurRegions(_) => ErrorKind::NoValidBlurRegions,
            TimelapseError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            // A missing binary is a spawn failure as far as callers are concerned
            TimelapseError::EncoderNotFound | TimelapseError::EncoderSpawnFailure(_) => {
                ErrorKind::EncoderSpawnFailure
            }
            TimelapseError::EncoderExitFailure { .. } => ErrorKind::EncoderExitFailure,
            TimelapseError::Cancelled => ErrorKind::Cancelled,
            TimelapseError::JobAlreadyRunning { .. } => ErrorKind::JobAlreadyRunning,
            TimelapseError::InvalidInput(_) | TimelapseError::InvalidOutput(_) => {
                ErrorKind::InvalidInput
            }
            TimelapseError::Io(_) | TimelapseError::Json(_) => ErrorKind::Io,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TimelapseError::EncoderExitFailure { code, .. } => *code,
            _ => None,
        }
    }

    pub fn to_failure(&self) -> TranscodeFailure {
        TranscodeFailure {
            kind: self.kind(),
            message: self.to_string(),
            exit_code: self.exit_code(),
        }
    }
}

/// Serializable rejection of a transcode job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}
