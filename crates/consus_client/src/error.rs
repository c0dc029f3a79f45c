//! Error types for the Consus client.

use crate::transaction::TransactionState;
use consus_protocol::{ProtocolError, ReturnCode};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Malformed endpoint specification or conflicting connection options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation on a transaction that is no longer active.
    #[error("cannot {operation}: transaction is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the transaction is in.
        state: TransactionState,
    },

    /// The store could not be reached or the round trip failed.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Error message.
        message: String,
    },

    /// The store aborted the transaction.
    #[error("transaction aborted: {message}")]
    Aborted {
        /// Reason reported by the store.
        message: String,
    },

    /// Message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The store rejected the request.
    #[error("server error {code}: {message}")]
    Server {
        /// Return code sent by the store.
        code: ReturnCode,
        /// Detail sent by the store.
        message: String,
    },
}

impl ClientError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a store-unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates an aborted error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Maps a failed return code from the store to an error.
    pub fn from_code(code: ReturnCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| code.as_str().to_string());
        match code {
            ReturnCode::Aborted => Self::Aborted { message },
            c if c.is_transient() => Self::StoreUnavailable { message },
            code => Self::Server { code, message },
        }
    }

    /// Returns true if the store aborted the transaction.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ClientError::Aborted { .. })
    }

    /// Returns true if running the transaction again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Aborted { .. } | ClientError::StoreUnavailable { .. } => true,
            ClientError::Server { code, .. } => code.is_transient(),
            _ => false,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        if err.is_io() {
            Self::store_unavailable(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}
