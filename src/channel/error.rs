use junction_worker::WorkerError;
use thiserror::Error;

use crate::{sender::SendError, store::StoreError, supervisor::SupervisorError};

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Everything a channel operation can fail with.
///
/// Each kind carries an HTTP-style status code, a stable name and a short
/// description so the API layer can render it without matching on variants.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel `{id}` not found")]
    ChannelNotFound { id: String },

    #[error(
        "invalid channel type `{}`, must be one of: {}",
        .channel_type.as_deref().unwrap_or("<missing>"),
        .valid.join(", ")
    )]
    InvalidChannelType {
        channel_type: Option<String>,
        valid: Vec<String>,
    },

    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("invalid channel configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("channel `{id}` has been deleted")]
    ChannelDeleted { id: String },

    #[error("unknown worker implementation `{implementation}`")]
    UnknownImplementation { implementation: String },

    #[error("a worker named `{name}` is already attached")]
    DuplicateWorker { name: String },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("channel properties could not be (de)serialised: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChannelError {
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// HTTP-style status code for the API layer.
    pub fn code(&self) -> u16 {
        match self {
            Self::ChannelNotFound { .. } => 404,
            Self::InvalidChannelType { .. }
            | Self::InvalidMessage { .. }
            | Self::InvalidConfiguration { .. } => 400,
            Self::ChannelDeleted { .. } => 409,
            Self::Send(_) => 502,
            Self::UnknownImplementation { .. }
            | Self::DuplicateWorker { .. }
            | Self::Worker(_)
            | Self::Store(_)
            | Self::Json(_) => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChannelNotFound { .. } => "ChannelNotFound",
            Self::InvalidChannelType { .. } => "InvalidChannelType",
            Self::InvalidMessage { .. } => "InvalidMessage",
            Self::InvalidConfiguration { .. } => "InvalidConfiguration",
            Self::ChannelDeleted { .. } => "ChannelDeleted",
            Self::UnknownImplementation { .. } => "UnknownImplementation",
            Self::DuplicateWorker { .. } => "DuplicateWorker",
            Self::Worker(_) => "WorkerError",
            Self::Store(_) => "StoreError",
            Self::Send(_) => "SendError",
            Self::Json(_) => "JsonError",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ChannelNotFound { .. } => "channel not found",
            Self::InvalidChannelType { .. } => "invalid channel type",
            Self::InvalidMessage { .. } => "invalid message",
            Self::InvalidConfiguration { .. } => "invalid channel configuration",
            Self::ChannelDeleted { .. } => "channel deleted",
            Self::UnknownImplementation { .. } => "unknown worker implementation",
            Self::DuplicateWorker { .. } => "duplicate worker name",
            Self::Worker(_) => "worker failure",
            Self::Store(_) => "store failure",
            Self::Send(_) => "message could not be sent",
            Self::Json(_) => "serialisation failure",
        }
    }
}

impl From<SupervisorError> for ChannelError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::UnknownImplementation(implementation) => {
                Self::UnknownImplementation { implementation }
            }
            SupervisorError::DuplicateWorker(name) => Self::DuplicateWorker { name },
            SupervisorError::Worker(err) => Self::Worker(err),
        }
    }
}
