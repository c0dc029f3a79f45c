//! Client-side transactions.

use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use consus_protocol::TransactionId;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Address of a record: `(table, key)`.
pub type RecordKey = (Vec<u8>, Vec<u8>);

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        })
    }
}

/// A transaction against the store.
///
/// Every operation is one round trip, and the store decides conflicts. The
/// transaction mirrors its read and write sets locally for inspection.
///
/// State handling:
/// - `commit` success moves to `Committed`
/// - `abort`, or any operation the store answers with an abort, moves to
///   `Aborted`
/// - a transport failure leaves the state unchanged
/// - once the session is closed, the store has aborted the transaction; the
///   next operation moves it to `Aborted`
///
/// Once terminal, every operation fails with
/// [`ClientError::InvalidState`]. Dropping an active transaction aborts it
/// on a best-effort basis.
pub struct Transaction {
    session: Session,
    id: TransactionId,
    state: TransactionState,
    /// Slot of the last operation issued.
    slot: u64,
    /// Read set: record -> value observed (`None` if absent).
    reads: HashMap<RecordKey, Option<Vec<u8>>>,
    /// Write set: record -> pending value.
    writes: HashMap<RecordKey, Vec<u8>>,
}

impl Transaction {
    pub(crate) fn new(session: Session, id: TransactionId) -> Self {
        Self {
            session,
            id,
            state: TransactionState::Active,
            slot: 0,
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Returns the store-assigned transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the session that began this transaction.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the values observed by reads that were not preceded by a
    /// write of the same record.
    pub fn read_set(&self) -> &HashMap<RecordKey, Option<Vec<u8>>> {
        &self.reads
    }

    /// Returns the pending writes.
    pub fn write_set(&self) -> &HashMap<RecordKey, Vec<u8>> {
        &self.writes
    }

    /// Reads a record.
    ///
    /// Returns this transaction's own pending write if there is one, else
    /// the committed value visible to the transaction, else `None`.
    pub fn get(
        &mut self,
        table: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
    ) -> ClientResult<Option<Vec<u8>>> {
        self.ensure_active("get")?;
        let (table, key) = (table.as_ref(), key.as_ref());
        let slot = self.next_slot();
        let value = self.observe(self.session.transport().get(self.id, slot, table, key))?;

        let record = (table.to_vec(), key.to_vec());
        if !self.writes.contains_key(&record) {
            self.reads.entry(record).or_insert_with(|| value.clone());
        }
        Ok(value)
    }

    /// Writes a record.
    ///
    /// The value stays invisible to other transactions until commit. May
    /// block while an older transaction holds the record's lock.
    pub fn put(
        &mut self,
        table: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> ClientResult<()> {
        self.ensure_active("put")?;
        let (table, key, value) = (table.as_ref(), key.as_ref(), value.as_ref());
        let slot = self.next_slot();
        self.observe(self.session.transport().put(self.id, slot, table, key, value))?;
        self.writes
            .insert((table.to_vec(), key.to_vec()), value.to_vec());
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// On success all writes become visible atomically. If the store aborts
    /// the transaction instead, the writes are discarded and
    /// [`ClientError::Aborted`] is returned.
    pub fn commit(&mut self) -> ClientResult<()> {
        self.ensure_active("commit")?;
        let slot = self.next_slot();
        self.observe(self.session.transport().commit(self.id, slot))?;
        self.state = TransactionState::Committed;
        debug!(txid = %self.id, writes = self.writes.len(), "transaction committed");
        Ok(())
    }

    /// Aborts the transaction, discarding its writes.
    ///
    /// The transaction is `Aborted` afterwards even if the store could not
    /// be told; the store then cleans up when the connection goes away.
    pub fn abort(&mut self) -> ClientResult<()> {
        if self.is_active() && self.session.is_closed() {
            self.mark_aborted("session closed");
            return Ok(());
        }
        self.ensure_active("abort")?;
        let slot = self.next_slot();
        let result = self.session.transport().abort(self.id, slot);
        self.state = TransactionState::Aborted;
        self.writes.clear();
        debug!(txid = %self.id, "transaction aborted");
        match result {
            Ok(()) => Ok(()),
            // The store had already aborted it; the caller got what it asked for.
            Err(err) if err.is_aborted() => Ok(()),
            Err(err) => {
                warn!(txid = %self.id, error = %err, "abort not delivered");
                Err(err)
            }
        }
    }

    fn ensure_active(&mut self, operation: &'static str) -> ClientResult<()> {
        if !self.is_active() {
            return Err(ClientError::InvalidState {
                operation,
                state: self.state,
            });
        }
        if self.session.is_closed() {
            self.mark_aborted("session closed");
            return Err(ClientError::aborted("session closed"));
        }
        Ok(())
    }

    fn mark_aborted(&mut self, reason: &str) {
        debug!(txid = %self.id, reason, "transaction aborted by store");
        self.state = TransactionState::Aborted;
        self.writes.clear();
    }

    fn next_slot(&mut self) -> u64 {
        self.slot += 1;
        self.slot
    }

    /// Moves to `Aborted` if the store reports an abort, or if the session
    /// closed while the operation was in flight.
    fn observe<T>(&mut self, result: ClientResult<T>) -> ClientResult<T> {
        match result {
            Err(err) if err.is_aborted() => {
                self.mark_aborted(&err.to_string());
                Err(err)
            }
            Err(ClientError::StoreUnavailable { .. }) if self.session.is_closed() => {
                self.mark_aborted("session closed");
                Err(ClientError::aborted("session closed"))
            }
            other => other,
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() && !self.session.is_closed() {
            let slot = self.next_slot();
            if let Err(err) = self.session.transport().abort(self.id, slot) {
                debug!(txid = %self.id, error = %err, "abort on drop failed");
            }
        }
    }
}
