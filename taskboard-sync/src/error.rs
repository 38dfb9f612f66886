use taskboard_core::ReorderError;

use crate::resource::ResourceKey;

/// Failures talking to the REST backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("Request to {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Could not decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn decode(path: &str, err: impl std::fmt::Display) -> Self {
        RemoteError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Reorder(#[from] ReorderError),

    #[error("Name must not be empty")]
    EmptyName,

    #[error("Board not found: {0}")]
    UnknownBoard(String),

    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("{0} has not been loaded")]
    NotLoaded(ResourceKey),

    #[error("{0} is still waiting for its server id")]
    PendingId(String),

    #[error("No board view available for {0}")]
    ViewUnavailable(String),
}
