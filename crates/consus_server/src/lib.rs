//! # Consus Server
//!
//! Reference store server for the Consus transaction protocol.
//!
//! This crate provides:
//! - Request dispatch onto the `consus_core` transaction engine
//! - Per-connection ownership of open transactions
//! - A tokio TCP listener speaking length-prefixed CBOR frames
//!
//! # Architecture
//!
//! [`StoreServer`] is transport-agnostic: it takes encoded requests tagged
//! with a connection ID and returns encoded responses. [`serve`] drives it
//! from TCP connections; in-process clients can call it directly.
//!
//! When a connection goes away, every transaction it began and did not
//! finish is aborted, releasing its locks.
//!
//! ```rust,ignore
//! use consus_server::{ServerConfig, StoreServer};
//! use std::sync::Arc;
//!
//! let server = Arc::new(StoreServer::new(ServerConfig::default()));
//! let listener = consus_server::bind(&server).await?;
//! consus_server::serve(server, listener, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod net;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use net::{bind, serve, spawn, ServerHandle};
pub use server::StoreServer;
