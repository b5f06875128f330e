use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Sample acquisition errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamError(String),

    #[error("Failed to start stream: {0}")]
    PlayError(String),

    #[error("Input device stopped delivering samples: {0}")]
    Disconnected(String),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("End of recording")]
    EndOfStream,
}

/// Event log errors
#[derive(Error, Debug)]
pub enum EventStoreError {
    #[error("Event log {path} is not a valid event list: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read event log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write event log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Detection loop errors
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("History capacity must be at least 1")]
    EmptyHistory,

    #[error("Detection loop is not running")]
    NotRunning,

    #[error("Detection loop was already started")]
    AlreadyStarted,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),
}
