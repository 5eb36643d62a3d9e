//! Error types for stream registration and message dispatch.

use thiserror::Error;

/// Result type for stream registration
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised while registering command streams, before the runtime runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("command stream `{0}` is already registered")]
    DuplicateName(String),

    #[error("command stream names may not be empty")]
    EmptyName,
}

/// Error returned by fallible dispatch once the runtime has stopped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("runtime is no longer running; message dropped")]
    Closed,
}

impl StreamError {
    /// Check if this error names a stream that already exists
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StreamError::DuplicateName(_))
    }
}
