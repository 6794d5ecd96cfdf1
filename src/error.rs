// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a frame is rejected before any analysis runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame has {found} landmarks, expected {expected}")]
    TooFewLandmarks { found: usize, expected: usize },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("unknown exercise kind: {0}")]
    UnknownExercise(String),

    #[error("config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keyframe capture failed: {0}")]
    Capture(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("frame channel closed")]
    ChannelClosed,

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
