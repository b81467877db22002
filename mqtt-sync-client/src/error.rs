use std::io;

use thiserror::Error;

use crate::mqtt::{ProtocolError, ValidationError};

/// The failure of a session operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The request was rejected before anything was sent.
    #[error("invalid request, {0}")]
    Validation(#[from] ValidationError),

    /// The transport could not be opened, written or read, or the response timed out.
    #[error("transport error, {0}")]
    Transport(#[from] io::Error),

    /// The broker answered with something else than the expected acknowledgment,
    /// or refused the request.
    #[error("protocol error, {0}")]
    Protocol(#[from] ProtocolError),

    /// The operation was aborted through its cancel token.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the broker did not answer in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport(err) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// A specialized `Result` type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
