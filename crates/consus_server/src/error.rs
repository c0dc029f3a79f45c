//! Error types for the store server.

use consus_core::CoreError;
use consus_protocol::{ProtocolError, ReturnCode};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the store server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Request could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(#[from] ProtocolError),

    /// The engine refused the operation.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the request was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::Malformed(_) | ServerError::Store(_))
    }

    /// Returns true if the server was at fault.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_) | ServerError::Io(_))
    }

    /// Maps the error to the code reported on the wire.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ServerError::Malformed(_) => ReturnCode::Garbage,
            ServerError::Store(err) => err.return_code(),
            ServerError::Internal(_) => ReturnCode::Internal,
            ServerError::Io(_) => ReturnCode::ServerError,
        }
    }
}
