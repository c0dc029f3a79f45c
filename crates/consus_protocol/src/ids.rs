//! Transaction identifiers.

use std::fmt;

/// Identifier the store assigns to a transaction at begin time.
///
/// `start` is the store's monotonic begin timestamp and `number` a unique
/// counter. Together they give every transaction a fixed age, which the
/// store's lock table uses to decide who yields under contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId {
    /// Begin timestamp in microseconds since the store started.
    pub start: u64,
    /// Unique transaction number.
    pub number: u64,
}

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(start: u64, number: u64) -> Self {
        Self { start, number }
    }

    /// Returns true if this transaction is older than `other` and therefore
    /// takes precedence over it when both want the same lock.
    #[must_use]
    pub fn preempts(&self, other: &TransactionId) -> bool {
        (self.start, self.number) < (other.start, other.number)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn(start={}, number={})", self.start, self.number)
    }
}
