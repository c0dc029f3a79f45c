//! Multi-version key space.

use crate::types::{SequenceNumber, TableKey};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A committed version of one key.
#[derive(Debug, Clone)]
struct Version {
    seq: SequenceNumber,
    value: Vec<u8>,
}

/// Committed data, one ordered version chain per key.
///
/// Readers name a snapshot sequence number and see the newest version at or
/// below it. Tables have no schema and come into existence on first write.
#[derive(Debug)]
pub struct VersionedStore {
    /// Version chains, oldest first.
    data: RwLock<HashMap<TableKey, Vec<Version>>>,
    max_versions: usize,
}

impl VersionedStore {
    /// Creates an empty store retaining up to `max_versions` per key.
    pub fn new(max_versions: usize) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            max_versions: max_versions.max(1),
        }
    }

    /// Reads the value visible at `snapshot`.
    ///
    /// Returns the value together with the sequence number that wrote it.
    pub fn get_at(
        &self,
        key: &TableKey,
        snapshot: SequenceNumber,
    ) -> Option<(Vec<u8>, SequenceNumber)> {
        let data = self.data.read();
        data.get(key)?
            .iter()
            .rev()
            .find(|v| v.seq <= snapshot)
            .map(|v| (v.value.clone(), v.seq))
    }

    /// Returns the sequence number of the newest committed version of `key`.
    pub fn latest_seq(&self, key: &TableKey) -> Option<SequenceNumber> {
        self.data
            .read()
            .get(key)
            .and_then(|chain| chain.last())
            .map(|v| v.seq)
    }

    /// Installs a batch of writes at `seq`.
    ///
    /// `oldest_snapshot` is the oldest snapshot any live transaction may still
    /// read at; versions shadowed for every such reader are pruned once a
    /// chain grows past the retention limit.
    pub fn apply<I>(&self, writes: I, seq: SequenceNumber, oldest_snapshot: SequenceNumber)
    where
        I: IntoIterator<Item = (TableKey, Vec<u8>)>,
    {
        let mut data = self.data.write();
        for (key, value) in writes {
            let chain = data.entry(key).or_default();
            chain.push(Version { seq, value });
            while chain.len() > self.max_versions && chain[1].seq <= oldest_snapshot {
                chain.remove(0);
            }
        }
    }

    /// Number of distinct keys with at least one committed version.
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Number of versions retained for `key`.
    pub fn version_count(&self, key: &TableKey) -> usize {
        self.data.read().get(key).map_or(0, Vec::len)
    }
}

impl Default for VersionedStore {
    fn default() -> Self {
        Self::new(16)
    }
}
