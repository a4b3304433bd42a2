//! Error types for emitter operations.

use thiserror::Error;

use crate::event::SharedError;

/// Errors that can escape an emitter operation.
#[derive(Error, Debug)]
pub enum EmitterError {
    /// A listener failed and the failure was not handled by an `"error"` listener.
    #[error(transparent)]
    Listener(SharedError),

    /// An `"error"` event was emitted without an error value and nobody listens for it.
    #[error("unhandled error event")]
    UnhandledErrorEvent,

    /// A pending wait was cancelled. Carries the caller-supplied reason.
    #[error("{0}")]
    Cancelled(String),

    /// Typed payload could not be converted to or from JSON.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An async listener was reached from `emit` outside of a tokio runtime.
    #[error("async listener requires a tokio runtime; use emit_async")]
    NoRuntime,
}

impl EmitterError {
    /// Returns true if this error came from cancelling a wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EmitterError::Cancelled(_))
    }
}

/// Result type alias for emitter operations.
pub type Result<T> = std::result::Result<T, EmitterError>;
