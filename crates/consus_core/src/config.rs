//! Engine configuration.

use std::time::Duration;

/// Configuration for the transactional engine.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a younger transaction waits for a lock held by an older one
    /// before it aborts itself.
    pub lock_wait_timeout: Duration,
    /// Number of versions kept per key before old, unreachable versions are
    /// pruned.
    pub max_versions_per_key: usize,
    /// Number of transactions aborted on a closed connection that are
    /// remembered, so their clients are told of the abort.
    pub aborted_retention: usize,
}

impl StoreConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            lock_wait_timeout: Duration::from_secs(2),
            max_versions_per_key: 16,
            aborted_retention: 4096,
        }
    }

    /// Sets the lock wait timeout.
    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    /// Sets the number of versions retained per key. Values below one are
    /// treated as one.
    pub fn with_max_versions_per_key(mut self, max: usize) -> Self {
        self.max_versions_per_key = max.max(1);
        self
    }

    /// Sets how many transactions aborted on disconnect are remembered.
    pub fn with_aborted_retention(mut self, count: usize) -> Self {
        self.aborted_retention = count;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
