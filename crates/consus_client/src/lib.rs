//! # Consus Client
//!
//! Transaction session client for the Consus key-value store.
//!
//! A [`Session`] is a long-lived handle on a store cluster. It begins
//! [`Transaction`]s, which read and write opaque `(table, key)` records and
//! end in exactly one of commit or abort:
//!
//! ```no_run
//! use consus_client::Session;
//!
//! # fn main() -> consus_client::ClientResult<()> {
//! let session = Session::connect("127.0.0.1:1982")?;
//! let mut txn = session.begin_transaction()?;
//! if txn.get("accounts", "alice")?.is_none() {
//!     txn.put("accounts", "alice", "100")?;
//! }
//! txn.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! A commit that loses a conflict fails with [`ClientError::Aborted`], which
//! is always distinguishable from [`ClientError::StoreUnavailable`]
//! (transport failure). Operations on a finished transaction fail with
//! [`ClientError::InvalidState`].
//!
//! ## Transports
//!
//! Sessions talk to the store through the [`Transport`] trait. The default
//! is [`FramedTransport`] over [`TcpChannel`]; [`LoopbackChannel`] runs
//! against an in-process store and [`MockTransport`] serves unit tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod config;
mod error;
mod framed;
mod loopback;
mod session;
mod tcp;
mod transaction;
mod transport;

pub use address::{join, parse_endpoints, parse_host_with_port, ConnectOptions, Endpoint};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use framed::{Channel, FramedTransport};
pub use loopback::{LoopbackChannel, LoopbackServer};
pub use session::Session;
pub use tcp::TcpChannel;
pub use transaction::{RecordKey, Transaction, TransactionState};
pub use transport::{MockTransport, Transport};

pub use consus_protocol::{ReturnCode, TransactionId};
