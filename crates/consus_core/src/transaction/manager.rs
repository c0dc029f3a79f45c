//! Transaction manager.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::lock::{LockDecision, LockTable};
use crate::store::VersionedStore;
use crate::transaction::state::TransactionRecord;
use crate::types::{SequenceNumber, TableKey};
use consus_protocol::TransactionId;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Runs transactions against a [`VersionedStore`].
///
/// The transaction manager provides:
/// - Transaction IDs ordered by begin time
/// - Snapshot reads that take no locks
/// - Wound-wait exclusive locks on written keys
/// - First-committer-wins validation at commit
///
/// Every operation names its transaction and an operation slot. Slots must
/// strictly increase within a transaction; a repeated or lower slot is
/// rejected without side effects.
pub struct TransactionManager {
    config: StoreConfig,
    store: VersionedStore,
    /// Transaction records and the lock table, guarded together.
    inner: Mutex<ManagerState>,
    /// Signalled whenever locks are released.
    lock_released: Condvar,
    /// Reference point for transaction start stamps.
    epoch: Instant,
    /// Next transaction number.
    next_number: AtomicU64,
    /// Current committed sequence (for snapshots).
    committed_seq: AtomicU64,
}

struct ManagerState {
    txns: HashMap<TransactionId, TransactionRecord>,
    locks: LockTable,
    /// Transactions dropped without their client, still reported as aborted.
    orphaned: AbortedLog,
}

/// Bounded memory of transactions removed on the store's initiative.
struct AbortedLog {
    order: VecDeque<TransactionId>,
    reasons: HashMap<TransactionId, String>,
    capacity: usize,
}

impl AbortedLog {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            reasons: HashMap::new(),
            capacity,
        }
    }

    fn remember(&mut self, txid: TransactionId, reason: String) {
        if self.capacity == 0 {
            return;
        }
        if self.reasons.insert(txid, reason).is_none() {
            self.order.push_back(txid);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.reasons.remove(&oldest);
            }
        }
    }

    fn reason(&self, txid: TransactionId) -> Option<&str> {
        self.reasons.get(&txid).map(String::as_str)
    }

    fn take(&mut self, txid: TransactionId) -> Option<String> {
        let reason = self.reasons.remove(&txid)?;
        self.order.retain(|t| *t != txid);
        Some(reason)
    }

    fn len(&self) -> usize {
        self.reasons.len()
    }
}

impl ManagerState {
    fn new(config: &StoreConfig) -> Self {
        Self {
            txns: HashMap::new(),
            locks: LockTable::new(),
            orphaned: AbortedLog::new(config.aborted_retention),
        }
    }

    fn record_mut(&mut self, txid: TransactionId) -> CoreResult<&mut TransactionRecord> {
        if !self.txns.contains_key(&txid) {
            return Err(self.missing(txid));
        }
        self.txns
            .get_mut(&txid)
            .ok_or(CoreError::UnknownTransaction(txid))
    }

    /// Error for an ID with no live record.
    fn missing(&self, txid: TransactionId) -> CoreError {
        match self.orphaned.reason(txid) {
            Some(reason) => CoreError::transaction_aborted(txid, reason),
            None => CoreError::UnknownTransaction(txid),
        }
    }

    /// Aborts a transaction but keeps its record for the client to observe.
    fn abort_in_place(&mut self, txid: TransactionId, reason: &str) {
        if let Some(record) = self.txns.get_mut(&txid) {
            self.locks.release_all(txid, record.locked_keys());
            record.mark_aborted(reason);
        }
    }

    /// Forgets a transaction and releases its locks.
    fn remove(&mut self, txid: TransactionId) -> Option<TransactionRecord> {
        let record = self.txns.remove(&txid)?;
        self.locks.release_all(txid, record.locked_keys());
        Some(record)
    }

    fn oldest_snapshot(&self, fallback: SequenceNumber) -> SequenceNumber {
        self.txns
            .values()
            .filter(|r| r.is_active())
            .map(TransactionRecord::snapshot)
            .min()
            .unwrap_or(fallback)
    }
}

impl TransactionManager {
    /// Creates a transaction manager over an empty store.
    pub fn new(config: StoreConfig) -> Self {
        let store = VersionedStore::new(config.max_versions_per_key);
        let inner = Mutex::new(ManagerState::new(&config));
        Self {
            config,
            store,
            inner,
            lock_released: Condvar::new(),
            epoch: Instant::now(),
            next_number: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the underlying committed data.
    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    /// Returns the sequence number of the latest commit.
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Number of transactions the store still holds a record for.
    pub fn active_count(&self) -> usize {
        self.inner.lock().txns.len()
    }

    /// Number of transactions aborted on disconnect whose clients have not
    /// yet finished them.
    pub fn orphaned_count(&self) -> usize {
        self.inner.lock().orphaned.len()
    }

    /// Returns the transaction holding the lock on `key`.
    pub fn lock_holder(&self, key: &TableKey) -> Option<TransactionId> {
        self.inner.lock().locks.holder(key)
    }

    /// Begins a new transaction.
    ///
    /// The transaction reads the state as of the latest commit. IDs issued
    /// later always compare as younger.
    pub fn begin(&self) -> TransactionId {
        let mut inner = self.inner.lock();
        let start = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let txid = TransactionId::new(start, number);
        let snapshot = self.committed_seq();
        inner.txns.insert(txid, TransactionRecord::new(txid, snapshot));
        debug!(%txid, %snapshot, "transaction begun");
        txid
    }

    /// Reads `key` as seen by the transaction.
    ///
    /// The transaction's own pending write wins; otherwise the value visible
    /// at its snapshot is returned. `None` means the key is absent.
    pub fn get(
        &self,
        txid: TransactionId,
        slot: u64,
        key: &TableKey,
    ) -> CoreResult<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let record = inner.record_mut(txid)?;
        record.ensure_active()?;
        record.advance_slot(slot)?;

        if let Some(value) = record.pending(key) {
            return Ok(Some(value.clone()));
        }

        let found = self.store.get_at(key, record.snapshot());
        record.record_read(key.clone(), found.as_ref().map(|(_, seq)| *seq));
        Ok(found.map(|(value, _)| value))
    }

    /// Buffers a write of `key`, taking its lock first.
    ///
    /// If a younger transaction holds the lock it is aborted. If an older one
    /// holds it, this call blocks until the lock is released or the lock wait
    /// timeout passes; on timeout this transaction is aborted.
    pub fn put(
        &self,
        txid: TransactionId,
        slot: u64,
        key: TableKey,
        value: Vec<u8>,
    ) -> CoreResult<()> {
        let deadline = Instant::now().checked_add(self.config.lock_wait_timeout);
        let mut inner = self.inner.lock();
        {
            let record = inner.record_mut(txid)?;
            record.ensure_active()?;
            record.advance_slot(slot)?;
        }

        // After the wait expires the lock is requested once more: a younger
        // transaction may have taken it from the holder we waited on.
        let mut expired = false;
        loop {
            match inner.locks.request(&key, txid) {
                LockDecision::Granted => break,
                LockDecision::Wound(holder) => {
                    debug!(%txid, %holder, %key, "wounding younger lock holder");
                    inner.abort_in_place(holder, "wounded by an older transaction");
                    self.lock_released.notify_all();
                }
                LockDecision::Wait(holder) if expired => {
                    debug!(%txid, %holder, %key, "lock wait timed out");
                    inner.abort_in_place(txid, "lock wait timeout");
                    self.lock_released.notify_all();
                    return Err(CoreError::transaction_aborted(txid, "lock wait timeout"));
                }
                LockDecision::Wait(holder) => {
                    debug!(%txid, %holder, %key, "waiting for lock");
                    expired = match deadline {
                        Some(deadline) => self
                            .lock_released
                            .wait_until(&mut inner, deadline)
                            .timed_out(),
                        None => {
                            self.lock_released.wait(&mut inner);
                            false
                        }
                    };
                    // Another transaction may have wounded us while we slept.
                    inner.record_mut(txid)?.ensure_active()?;
                }
            }
        }

        inner.record_mut(txid)?.record_write(key, value);
        Ok(())
    }

    /// Commits a transaction.
    ///
    /// Fails with `TransactionAborted` if the engine already aborted the
    /// transaction or if any key it read or wrote was committed by someone
    /// else after its snapshot. Either way the transaction is finished.
    pub fn commit(&self, txid: TransactionId, slot: u64) -> CoreResult<SequenceNumber> {
        let mut inner = self.inner.lock();
        if let Some(reason) = inner.orphaned.take(txid) {
            return Err(CoreError::transaction_aborted(txid, reason));
        }
        let outcome = {
            let record = inner.record_mut(txid)?;
            record.advance_slot(slot)?;
            record.ensure_active().and_then(|()| self.validate(record))
        };

        let Some(record) = inner.remove(txid) else {
            return Err(CoreError::UnknownTransaction(txid));
        };
        if let Err(err) = outcome {
            self.lock_released.notify_all();
            debug!(%txid, error = %err, "commit refused");
            return Err(err);
        }

        let writes = record.into_writes();
        let committed = self.committed_seq();
        let seq = if writes.is_empty() {
            committed
        } else {
            let seq = committed.next();
            let oldest = inner.oldest_snapshot(seq);
            self.store.apply(writes, seq, oldest);
            self.committed_seq.store(seq.as_u64(), Ordering::SeqCst);
            seq
        };
        self.lock_released.notify_all();
        debug!(%txid, %seq, "transaction committed");
        Ok(seq)
    }

    /// Aborts a transaction, discarding its writes and releasing its locks.
    ///
    /// Aborting a transaction the engine already aborted succeeds.
    pub fn abort(&self, txid: TransactionId, slot: u64) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.orphaned.take(txid).is_some() {
            debug!(%txid, "abort of transaction already aborted on disconnect");
            return Ok(());
        }
        inner.record_mut(txid)?.advance_slot(slot)?;
        inner.remove(txid);
        self.lock_released.notify_all();
        debug!(%txid, "transaction aborted");
        Ok(())
    }

    /// Aborts every listed transaction that is still known, e.g. when the
    /// connection that owns them goes away. Returns how many were aborted.
    ///
    /// Their IDs are remembered, up to `aborted_retention` of them, so a
    /// client that reaches the store over another connection is answered
    /// with an abort rather than an unknown transaction.
    pub fn abort_all(&self, txids: &[TransactionId]) -> usize {
        let mut inner = self.inner.lock();
        let mut count = 0;
        for &txid in txids {
            if let Some(record) = inner.remove(txid) {
                let reason = record.abort_reason().unwrap_or("connection closed").to_string();
                inner.orphaned.remember(txid, reason);
                count += 1;
            }
        }
        if count > 0 {
            self.lock_released.notify_all();
        }
        count
    }

    fn validate(&self, record: &TransactionRecord) -> CoreResult<()> {
        for key in record.touched_keys() {
            if let Some(latest) = self.store.latest_seq(key) {
                if latest > record.snapshot() {
                    return Err(CoreError::transaction_aborted(
                        record.id(),
                        format!("conflict on {key}: committed at {latest}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn key(k: &str) -> TableKey {
        TableKey::new("kv", k)
    }

    #[test]
    fn commit_makes_writes_visible() {
        let tm = TransactionManager::default();

        let t1 = tm.begin();
        assert_eq!(tm.get(t1, 1, &key("k")).unwrap(), None);
        tm.put(t1, 2, key("k"), b"v".to_vec()).unwrap();
        assert_eq!(tm.get(t1, 3, &key("k")).unwrap(), Some(b"v".to_vec()));
        let seq = tm.commit(t1, 4).unwrap();
        assert_eq!(seq, SequenceNumber::new(1));

        let t2 = tm.begin();
        assert_eq!(tm.get(t2, 1, &key("k")).unwrap(), Some(b"v".to_vec()));
        tm.commit(t2, 2).unwrap();
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn empty_commit_does_not_advance_sequence() {
        let tm = TransactionManager::default();
        let t = tm.begin();
        assert_eq!(tm.commit(t, 1).unwrap(), SequenceNumber::new(0));
        assert_eq!(tm.committed_seq(), SequenceNumber::new(0));
    }

    #[test]
    fn aborted_writes_are_discarded() {
        let tm = TransactionManager::default();
        let t1 = tm.begin();
        tm.put(t1, 1, key("k"), b"v".to_vec()).unwrap();
        tm.abort(t1, 2).unwrap();
        assert_eq!(tm.lock_holder(&key("k")), None);

        let t2 = tm.begin();
        assert_eq!(tm.get(t2, 1, &key("k")).unwrap(), None);
    }

    #[test]
    fn reads_use_begin_snapshot() {
        let tm = TransactionManager::default();
        let reader = tm.begin();

        let writer = tm.begin();
        tm.put(writer, 1, key("k"), b"new".to_vec()).unwrap();
        tm.commit(writer, 2).unwrap();

        assert_eq!(tm.get(reader, 1, &key("k")).unwrap(), None);
    }

    #[test]
    fn stale_read_fails_validation() {
        let tm = TransactionManager::default();
        let t1 = tm.begin();
        assert_eq!(tm.get(t1, 1, &key("k")).unwrap(), None);

        let t2 = tm.begin();
        tm.put(t2, 1, key("k"), b"v".to_vec()).unwrap();
        tm.commit(t2, 2).unwrap();

        let err = tm.commit(t1, 2).unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn older_writer_wounds_younger_holder() {
        let tm = TransactionManager::default();
        let t1 = tm.begin();
        let t2 = tm.begin();

        tm.put(t2, 1, key("k"), b"young".to_vec()).unwrap();
        tm.put(t1, 1, key("k"), b"old".to_vec()).unwrap();
        assert_eq!(tm.lock_holder(&key("k")), Some(t1));

        let err = tm.commit(t2, 2).unwrap_err();
        assert!(err.is_aborted());
        tm.commit(t1, 2).unwrap();

        let t3 = tm.begin();
        assert_eq!(tm.get(t3, 1, &key("k")).unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn wounded_transaction_fails_every_later_operation() {
        let tm = TransactionManager::default();
        let t1 = tm.begin();
        let t2 = tm.begin();
        tm.put(t2, 1, key("k"), b"x".to_vec()).unwrap();
        tm.put(t1, 1, key("k"), b"y".to_vec()).unwrap();

        assert!(tm.get(t2, 2, &key("other")).unwrap_err().is_aborted());
        assert!(tm.put(t2, 3, key("other"), b"z".to_vec()).unwrap_err().is_aborted());
        // Record survives until the client finishes it.
        assert_eq!(tm.active_count(), 2);
        tm.abort(t2, 4).unwrap();
        assert_eq!(tm.active_count(), 1);
    }

    #[test]
    fn younger_waits_for_older_holder() {
        let tm = Arc::new(TransactionManager::default());
        let older = tm.begin();
        let younger = tm.begin();
        tm.put(older, 1, key("k"), b"old".to_vec()).unwrap();

        let waiter = {
            let tm = Arc::clone(&tm);
            thread::spawn(move || tm.put(younger, 1, key("k"), b"young".to_vec()))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(tm.lock_holder(&key("k")), Some(older));
        tm.abort(older, 2).unwrap();

        waiter.join().unwrap().unwrap();
        assert_eq!(tm.lock_holder(&key("k")), Some(younger));
        tm.commit(younger, 2).unwrap();
    }

    #[test]
    fn lock_wait_timeout_aborts_waiter() {
        let tm = TransactionManager::new(
            StoreConfig::new().with_lock_wait_timeout(Duration::from_millis(20)),
        );
        let older = tm.begin();
        let younger = tm.begin();
        tm.put(older, 1, key("k"), b"old".to_vec()).unwrap();

        let err = tm.put(younger, 1, key("k"), b"young".to_vec()).unwrap_err();
        assert!(err.is_aborted());
        assert!(tm.commit(younger, 2).unwrap_err().is_aborted());
        tm.commit(older, 2).unwrap();
    }

    #[test]
    fn out_of_order_slot_rejected() {
        let tm = TransactionManager::default();
        let t = tm.begin();
        tm.put(t, 2, key("k"), b"v".to_vec()).unwrap();
        assert!(matches!(
            tm.get(t, 2, &key("k")),
            Err(CoreError::OutOfOrder { slot: 2, last: 2, .. })
        ));
        // Rejected operation leaves the transaction usable.
        assert_eq!(tm.get(t, 3, &key("k")).unwrap(), Some(b"v".to_vec()));
        tm.commit(t, 4).unwrap();
    }

    #[test]
    fn unknown_transaction() {
        let tm = TransactionManager::default();
        let ghost = TransactionId::new(0, 999);
        assert_eq!(
            tm.commit(ghost, 1),
            Err(CoreError::UnknownTransaction(ghost))
        );
        let t = tm.begin();
        tm.commit(t, 1).unwrap();
        assert_eq!(tm.commit(t, 2), Err(CoreError::UnknownTransaction(t)));
    }

    #[test]
    fn abort_all_releases_locks() {
        let tm = TransactionManager::default();
        let t1 = tm.begin();
        let t2 = tm.begin();
        tm.put(t1, 1, key("a"), b"1".to_vec()).unwrap();
        tm.put(t2, 1, key("b"), b"2".to_vec()).unwrap();

        assert_eq!(tm.abort_all(&[t1, t2, TransactionId::new(0, 77)]), 2);
        assert_eq!(tm.lock_holder(&key("a")), None);
        assert_eq!(tm.lock_holder(&key("b")), None);
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn disconnected_transactions_report_abort_until_finished() {
        let tm = TransactionManager::default();
        let committer = tm.begin();
        let aborter = tm.begin();
        tm.put(committer, 1, key("a"), b"1".to_vec()).unwrap();

        assert_eq!(tm.abort_all(&[committer, aborter]), 2);
        assert_eq!(tm.active_count(), 0);
        assert_eq!(tm.orphaned_count(), 2);

        assert!(tm.get(committer, 2, &key("a")).unwrap_err().is_aborted());
        assert!(tm.put(committer, 3, key("b"), b"2".to_vec()).unwrap_err().is_aborted());
        let err = tm.commit(committer, 4).unwrap_err();
        assert!(err.is_aborted());
        assert!(err.to_string().contains("connection closed"), "{err}");
        // Finishing the transaction forgets it.
        assert_eq!(
            tm.commit(committer, 5),
            Err(CoreError::UnknownTransaction(committer))
        );

        tm.abort(aborter, 1).unwrap();
        assert_eq!(tm.orphaned_count(), 0);
        assert_eq!(tm.abort(aborter, 2), Err(CoreError::UnknownTransaction(aborter)));

        let reader = tm.begin();
        assert_eq!(tm.get(reader, 1, &key("a")).unwrap(), None);
    }

    #[test]
    fn disconnect_keeps_wound_reason() {
        let tm = TransactionManager::default();
        let older = tm.begin();
        let younger = tm.begin();
        tm.put(younger, 1, key("k"), b"y".to_vec()).unwrap();
        tm.put(older, 1, key("k"), b"o".to_vec()).unwrap();

        tm.abort_all(&[younger]);
        let err = tm.commit(younger, 2).unwrap_err();
        assert!(err.to_string().contains("wounded"), "{err}");
        tm.commit(older, 2).unwrap();
    }

    #[test]
    fn disconnect_memory_is_bounded() {
        let tm = TransactionManager::new(StoreConfig::new().with_aborted_retention(2));
        let ids: Vec<_> = (0..3).map(|_| tm.begin()).collect();

        assert_eq!(tm.abort_all(&ids), 3);
        assert_eq!(tm.orphaned_count(), 2);
        assert_eq!(tm.commit(ids[0], 1), Err(CoreError::UnknownTransaction(ids[0])));
        assert!(tm.commit(ids[1], 1).unwrap_err().is_aborted());
        assert!(tm.commit(ids[2], 1).unwrap_err().is_aborted());
        assert_eq!(tm.orphaned_count(), 0);
    }

    #[test]
    fn expired_waiter_wounds_younger_holder() {
        let tm = Arc::new(TransactionManager::new(
            StoreConfig::new().with_lock_wait_timeout(Duration::from_millis(200)),
        ));
        let oldest = tm.begin();
        let waiter = tm.begin();
        let youngest = tm.begin();
        tm.put(oldest, 1, key("k"), b"first".to_vec()).unwrap();

        let handle = {
            let tm = Arc::clone(&tm);
            thread::spawn(move || tm.put(waiter, 1, key("k"), b"second".to_vec()))
        };
        thread::sleep(Duration::from_millis(50));

        // Hand the lock from the oldest to the youngest without waking the
        // waiter, so it only notices once its wait expires.
        {
            let mut inner = tm.inner.lock();
            inner.remove(oldest);
            assert_eq!(inner.locks.request(&key("k"), youngest), LockDecision::Granted);
            inner
                .record_mut(youngest)
                .unwrap()
                .record_write(key("k"), b"third".to_vec());
        }

        handle.join().unwrap().unwrap();
        assert_eq!(tm.lock_holder(&key("k")), Some(waiter));
        assert!(tm.commit(youngest, 2).unwrap_err().is_aborted());
        tm.commit(waiter, 2).unwrap();
    }

    #[test]
    fn transaction_ids_increase() {
        let tm = TransactionManager::default();
        let a = tm.begin();
        let b = tm.begin();
        assert!(a.preempts(&b));
        assert!(!b.preempts(&a));
    }
}
