//! Status codes carried in every response.

use std::fmt;

/// Outcome of a request, as reported by the store.
///
/// Codes occupy the range `[6656, 6912)`, split into three blocks:
/// results (`66xx`), persistent programming errors (`6720..`) and
/// transient operational errors (`6784..`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// The request succeeded.
    Success,
    /// The request succeeded with weaker durability than requested.
    LessDurable,
    /// The key does not exist.
    NotFound,
    /// The transaction was aborted.
    Aborted,
    /// The transaction was already committed.
    Committed,
    /// The table does not exist.
    UnknownTable,
    /// No operation is pending.
    NonePending,
    /// The request was malformed or not valid for the transaction.
    Invalid,
    /// The request timed out.
    Timeout,
    /// The request was interrupted.
    Interrupted,
    /// An operating system error occurred.
    SeeErrno,
    /// The coordinator could not be reached.
    CoordFail,
    /// Not enough servers are reachable.
    Unavailable,
    /// The server reported an error.
    ServerError,
    /// Internal invariant violation.
    Internal,
    /// The response could not be understood.
    Garbage,
}

impl ReturnCode {
    /// Converts to the numeric wire code.
    pub fn to_code(self) -> u16 {
        match self {
            ReturnCode::Success => 6656,
            ReturnCode::LessDurable => 6657,
            ReturnCode::NotFound => 6658,
            ReturnCode::Aborted => 6659,
            ReturnCode::Committed => 6660,
            ReturnCode::UnknownTable => 6720,
            ReturnCode::NonePending => 6721,
            ReturnCode::Invalid => 6722,
            ReturnCode::Timeout => 6784,
            ReturnCode::Interrupted => 6785,
            ReturnCode::SeeErrno => 6786,
            ReturnCode::CoordFail => 6787,
            ReturnCode::Unavailable => 6788,
            ReturnCode::ServerError => 6789,
            ReturnCode::Internal => 6910,
            ReturnCode::Garbage => 6911,
        }
    }

    /// Converts from a numeric wire code. Unknown codes map to `Garbage`.
    pub fn from_code(code: u16) -> Self {
        match code {
            6656 => ReturnCode::Success,
            6657 => ReturnCode::LessDurable,
            6658 => ReturnCode::NotFound,
            6659 => ReturnCode::Aborted,
            6660 => ReturnCode::Committed,
            6720 => ReturnCode::UnknownTable,
            6721 => ReturnCode::NonePending,
            6722 => ReturnCode::Invalid,
            6784 => ReturnCode::Timeout,
            6785 => ReturnCode::Interrupted,
            6786 => ReturnCode::SeeErrno,
            6787 => ReturnCode::CoordFail,
            6788 => ReturnCode::Unavailable,
            6789 => ReturnCode::ServerError,
            6910 => ReturnCode::Internal,
            _ => ReturnCode::Garbage,
        }
    }

    /// Returns the canonical name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnCode::Success => "CONSUS_SUCCESS",
            ReturnCode::LessDurable => "CONSUS_LESS_DURABLE",
            ReturnCode::NotFound => "CONSUS_NOT_FOUND",
            ReturnCode::Aborted => "CONSUS_ABORTED",
            ReturnCode::Committed => "CONSUS_COMMITTED",
            ReturnCode::UnknownTable => "CONSUS_UNKNOWN_TABLE",
            ReturnCode::NonePending => "CONSUS_NONE_PENDING",
            ReturnCode::Invalid => "CONSUS_INVALID",
            ReturnCode::Timeout => "CONSUS_TIMEOUT",
            ReturnCode::Interrupted => "CONSUS_INTERRUPTED",
            ReturnCode::SeeErrno => "CONSUS_SEE_ERRNO",
            ReturnCode::CoordFail => "CONSUS_COORD_FAIL",
            ReturnCode::Unavailable => "CONSUS_UNAVAILABLE",
            ReturnCode::ServerError => "CONSUS_SERVER_ERROR",
            ReturnCode::Internal => "CONSUS_INTERNAL",
            ReturnCode::Garbage => "CONSUS_GARBAGE",
        }
    }

    /// Returns true for codes that report a successful request.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ReturnCode::Success | ReturnCode::LessDurable | ReturnCode::NotFound
        )
    }

    /// Returns true for transient operational errors, which say nothing about
    /// the transaction itself.
    pub fn is_transient(self) -> bool {
        (6784..6848).contains(&self.to_code())
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
