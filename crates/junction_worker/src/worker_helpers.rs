//! Error type and small config accessors shared by worker implementations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::WorkerConfig;

/// Errors that a worker, or the actor wrapping it, can return.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerError {
    /// The worker is not in a state where this operation is valid.
    #[error("invalid state for `{0}`")]
    InvalidState(String),

    /// A required configuration value is missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// The worker does not handle this kind of message.
    #[error("worker does not support {0} messages")]
    Unsupported(String),

    /// The actor task backing this handle has exited.
    #[error("worker actor `{0}` is gone")]
    ActorGone(String),

    /// Something went wrong serialising or parsing JSON.
    #[error("JSON error: {0}")]
    Json(String),

    /// The worker returned an unspecified failure.
    #[error("worker error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> WorkerError {
        WorkerError::Json(err.to_string())
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> WorkerError {
        WorkerError::Other(err.to_string())
    }
}

/// Fetch a required string value from a worker config.
pub fn required_str<'a>(config: &'a WorkerConfig, key: &str) -> Result<&'a str, WorkerError> {
    match config.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(WorkerError::Config(format!(
            "`{key}` must be a string, got {other}"
        ))),
        None => Err(WorkerError::Config(format!("missing required key `{key}`"))),
    }
}

/// Fetch an optional string value; anything that is not a string counts as absent.
pub fn optional_str<'a>(config: &'a WorkerConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}
