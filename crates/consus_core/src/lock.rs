//! Wound-wait lock table.
//!
//! Each key has at most one exclusive holder. Lock requests are decided by
//! transaction age: see [`LockTable::request`].

use crate::types::TableKey;
use consus_protocol::TransactionId;
use std::collections::HashMap;

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    /// The requester now holds the lock.
    Granted,
    /// The requester is older than the holder; the holder must be aborted
    /// and the request retried.
    Wound(TransactionId),
    /// The requester is younger than the holder and must wait.
    Wait(TransactionId),
}

/// Exclusive write locks keyed by `(table, key)`.
///
/// The table holds no synchronization of its own; the transaction manager
/// guards it together with the transaction records.
#[derive(Debug, Default)]
pub struct LockTable {
    holders: HashMap<TableKey, TransactionId>,
}

impl LockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the lock on `key` for `requester`.
    ///
    /// A free lock, or one the requester already holds, is granted. Otherwise
    /// an older requester wounds the holder and a younger one waits.
    pub fn request(&mut self, key: &TableKey, requester: TransactionId) -> LockDecision {
        match self.holders.get(key) {
            None => {
                self.holders.insert(key.clone(), requester);
                LockDecision::Granted
            }
            Some(&holder) if holder == requester => LockDecision::Granted,
            Some(&holder) if requester.preempts(&holder) => LockDecision::Wound(holder),
            Some(&holder) => LockDecision::Wait(holder),
        }
    }

    /// Returns the current holder of `key`.
    pub fn holder(&self, key: &TableKey) -> Option<TransactionId> {
        self.holders.get(key).copied()
    }

    /// Releases the given keys if `owner` holds them.
    pub fn release_all<'a, I>(&mut self, owner: TransactionId, keys: I)
    where
        I: IntoIterator<Item = &'a TableKey>,
    {
        for key in keys {
            if self.holders.get(key) == Some(&owner) {
                self.holders.remove(key);
            }
        }
    }

    /// Number of keys currently locked.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// Returns true if no key is locked.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> TableKey {
        TableKey::new("t", k)
    }

    #[test]
    fn free_lock_is_granted_and_reentrant() {
        let mut locks = LockTable::new();
        let t = TransactionId::new(1, 1);
        assert_eq!(locks.request(&key("a"), t), LockDecision::Granted);
        assert_eq!(locks.request(&key("a"), t), LockDecision::Granted);
        assert_eq!(locks.holder(&key("a")), Some(t));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn older_wounds_younger_waits() {
        let mut locks = LockTable::new();
        let older = TransactionId::new(10, 1);
        let younger = TransactionId::new(20, 2);

        assert_eq!(locks.request(&key("a"), younger), LockDecision::Granted);
        assert_eq!(locks.request(&key("a"), older), LockDecision::Wound(younger));

        assert_eq!(locks.request(&key("b"), older), LockDecision::Granted);
        assert_eq!(locks.request(&key("b"), younger), LockDecision::Wait(older));
    }

    #[test]
    fn release_only_own_locks() {
        let mut locks = LockTable::new();
        let t1 = TransactionId::new(1, 1);
        let t2 = TransactionId::new(2, 2);
        locks.request(&key("a"), t1);
        locks.request(&key("b"), t2);

        locks.release_all(t1, [&key("a"), &key("b")]);
        assert_eq!(locks.holder(&key("a")), None);
        assert_eq!(locks.holder(&key("b")), Some(t2));

        locks.release_all(t2, [&key("b")]);
        assert!(locks.is_empty());
    }
}
