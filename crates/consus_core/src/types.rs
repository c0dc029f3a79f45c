//! Keys and commit ordering.

use std::fmt;

/// Position of a commit in the store's history.
///
/// Every commit that writes something takes the next number; snapshots are
/// named by the number of the last commit they include. Zero is the empty
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Wraps a raw value.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The number the following commit takes.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Address of a record: an opaque table name and an opaque key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    /// Table name bytes.
    pub table: Vec<u8>,
    /// Key bytes.
    pub key: Vec<u8>,
}

impl TableKey {
    /// Creates a new table/key pair.
    pub fn new(table: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            String::from_utf8_lossy(&self.table).escape_debug(),
            String::from_utf8_lossy(&self.key).escape_debug()
        )
    }
}
