//! # Consus Core
//!
//! Reference transactional key-value engine behind the Consus store server.
//!
//! This crate provides:
//! - A multi-version key space addressed by opaque `(table, key)` bytes
//! - A wound-wait lock table for write intents
//! - A transaction manager with snapshot reads and first-committer-wins
//!   validation at commit
//!
//! ## Concurrency control
//!
//! Writes lock their key at `put` time. When two transactions want the same
//! lock, the older one wins: an older requester wounds (aborts) a younger
//! holder, a younger requester waits for the older holder up to
//! [`StoreConfig::lock_wait_timeout`] and aborts itself if the lock does not
//! come free. Waits only ever point from younger to older transactions, so
//! no wait cycle can form.
//!
//! At commit, every key the transaction read or wrote is checked against the
//! transaction's snapshot. If another transaction committed a newer version
//! in the meantime, the commit aborts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod lock;
mod store;
mod transaction;
mod types;

pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use lock::{LockDecision, LockTable};
pub use store::VersionedStore;
pub use transaction::{TransactionManager, TransactionRecord};
pub use types::{SequenceNumber, TableKey};

pub use consus_protocol::TransactionId;
