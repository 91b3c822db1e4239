//! Error types.
//!
//! One `thiserror` enum per concern, folded into [`Error`] for callers that
//! just want `?`.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Anything the runtime can hand back to a caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Post(#[from] PostError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected configuration or arguments. Returned synchronously, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("timer interval must be non-zero")]
    ZeroInterval,

    #[error("screen size {width}x{height} has no cells")]
    EmptyScreen { width: u16, height: u16 },

    #[error("sampler window must hold at least one frame")]
    ZeroWindow,
}

/// Failure to enqueue a message into the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("message queue is full")]
    Full,

    #[error("application loop has shut down")]
    Closed,
}

/// Failure of a synchronous request executed on the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("call was cancelled")]
    Cancelled,

    #[error("application loop has shut down")]
    Closed,

    #[error("call issued from the loop thread would deadlock")]
    Reentrant,
}

/// Failure while capturing, applying, saving or loading widget state.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("widget {key:?} failed to save state: {reason}")]
    Save { key: String, reason: String },

    #[error("widget {key:?} failed to restore state: {reason}")]
    Restore { key: String, reason: String },

    #[error("duplicate state key {0:?}")]
    DuplicateKey(String),

    #[error("payload for {key:?} is not valid base64: {source}")]
    Decode {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("snapshot document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
