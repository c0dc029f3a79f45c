//! Error types for the Consus engine.

use consus_protocol::{ReturnCode, TransactionId};
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Transaction was aborted by the engine.
    #[error("{txid} aborted: {reason}")]
    TransactionAborted {
        /// The aborted transaction.
        txid: TransactionId,
        /// Reason for the abort.
        reason: String,
    },

    /// No transaction with this ID is known.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    /// An operation arrived out of issue order.
    #[error("{txid} slot {slot} is not after slot {last}")]
    OutOfOrder {
        /// The transaction.
        txid: TransactionId,
        /// Slot of the rejected operation.
        slot: u64,
        /// Highest slot already seen.
        last: u64,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a transaction aborted error.
    pub fn transaction_aborted(txid: TransactionId, reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            txid,
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error reports an aborted transaction.
    pub fn is_aborted(&self) -> bool {
        matches!(self, CoreError::TransactionAborted { .. })
    }

    /// Maps the error to the code reported on the wire.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            CoreError::TransactionAborted { .. } => ReturnCode::Aborted,
            CoreError::UnknownTransaction(_)
            | CoreError::OutOfOrder { .. }
            | CoreError::InvalidOperation { .. } => ReturnCode::Invalid,
        }
    }
}
