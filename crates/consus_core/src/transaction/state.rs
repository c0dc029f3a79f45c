//! Store-side transaction state.

use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TableKey};
use consus_protocol::TransactionId;
use std::collections::HashMap;

/// The store's view of one live transaction.
///
/// A record exists from begin until the client commits or aborts. If the
/// engine aborts the transaction on its own (wound, lock timeout), the record
/// stays behind in the aborted state so the client learns of it on its next
/// operation.
#[derive(Debug)]
pub struct TransactionRecord {
    id: TransactionId,
    /// Reads see commits up to and including this sequence number.
    snapshot: SequenceNumber,
    /// Reason the engine aborted the transaction, if it did.
    abort_reason: Option<String>,
    /// Highest operation slot seen so far.
    last_slot: u64,
    /// Read set: key -> sequence number of the version observed.
    reads: HashMap<TableKey, Option<SequenceNumber>>,
    /// Buffered writes, installed at commit.
    writes: HashMap<TableKey, Vec<u8>>,
}

impl TransactionRecord {
    pub(crate) fn new(id: TransactionId, snapshot: SequenceNumber) -> Self {
        Self {
            id,
            snapshot,
            abort_reason: None,
            last_slot: 0,
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the snapshot sequence number.
    #[must_use]
    pub fn snapshot(&self) -> SequenceNumber {
        self.snapshot
    }

    /// Checks if the transaction has not been aborted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.abort_reason.is_none()
    }

    /// Returns the reason for an engine-initiated abort.
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Returns the read set.
    pub fn reads(&self) -> &HashMap<TableKey, Option<SequenceNumber>> {
        &self.reads
    }

    /// Returns the buffered writes.
    pub fn writes(&self) -> &HashMap<TableKey, Vec<u8>> {
        &self.writes
    }

    /// Fails with `TransactionAborted` if the engine aborted this transaction.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match &self.abort_reason {
            None => Ok(()),
            Some(reason) => Err(CoreError::transaction_aborted(self.id, reason.clone())),
        }
    }

    /// Accepts the next operation slot. Slots must strictly increase.
    pub(crate) fn advance_slot(&mut self, slot: u64) -> CoreResult<()> {
        if slot <= self.last_slot {
            return Err(CoreError::OutOfOrder {
                txid: self.id,
                slot,
                last: self.last_slot,
            });
        }
        self.last_slot = slot;
        Ok(())
    }

    /// Returns this transaction's own pending write for `key`.
    pub(crate) fn pending(&self, key: &TableKey) -> Option<&Vec<u8>> {
        self.writes.get(key)
    }

    /// Records a read for commit-time validation.
    pub(crate) fn record_read(&mut self, key: TableKey, observed: Option<SequenceNumber>) {
        // Keys we wrote are validated through the write set.
        if !self.writes.contains_key(&key) {
            self.reads.entry(key).or_insert(observed);
        }
    }

    /// Buffers a write. A later write to the same key replaces the earlier one.
    pub(crate) fn record_write(&mut self, key: TableKey, value: Vec<u8>) {
        self.writes.insert(key, value);
    }

    /// Marks the transaction aborted and drops its buffered writes.
    pub(crate) fn mark_aborted(&mut self, reason: impl Into<String>) {
        if self.abort_reason.is_none() {
            self.abort_reason = Some(reason.into());
        }
        self.writes.clear();
    }

    /// Keys this transaction may hold locks on.
    pub(crate) fn locked_keys(&self) -> impl Iterator<Item = &TableKey> {
        self.writes.keys()
    }

    /// Keys to validate at commit.
    pub(crate) fn touched_keys(&self) -> impl Iterator<Item = &TableKey> {
        self.reads.keys().chain(self.writes.keys())
    }

    /// Consumes the record and yields its writes.
    pub(crate) fn into_writes(self) -> HashMap<TableKey, Vec<u8>> {
        self.writes
    }
}
