//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or framing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Failed to encode a message to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The CBOR value does not have the shape of a protocol message.
    #[error("invalid message structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// The message type tag is not one this protocol knows.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A frame announced a length above the allowed maximum.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// Announced frame size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ProtocolError {
    /// Creates an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Creates a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Returns true if the error came from the transport rather than the bytes.
    pub fn is_io(&self) -> bool {
        matches!(self, ProtocolError::Io(_) | ProtocolError::UnexpectedEof)
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::UnexpectedEof
        } else {
            ProtocolError::Io(err.to_string())
        }
    }
}
