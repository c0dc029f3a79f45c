//! # Consus Protocol
//!
//! Wire vocabulary shared by the Consus client and store.
//!
//! This crate provides:
//! - `TransactionId` and its wound-wait age ordering
//! - `ReturnCode`, the status codes carried in every response
//! - `Request` / `Response` messages with CBOR encoding
//! - Length-prefixed framing over byte streams
//!
//! This is a pure protocol crate: framing helpers operate on any
//! `std::io` stream or on a `BytesMut` buffer, but the crate opens no
//! connections of its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod ids;
mod messages;
mod returncode;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{encode_frame, read_frame, write_frame, FrameDecoder, MAX_FRAME_SIZE};
pub use ids::TransactionId;
pub use messages::{Request, RequestEnvelope, Response};
pub use returncode::ReturnCode;

/// Port the store listens on when none is configured.
pub const DEFAULT_PORT: u16 = 1982;

/// Host the client connects to when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";
