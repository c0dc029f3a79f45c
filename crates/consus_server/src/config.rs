//! Server configuration.

use consus_core::StoreConfig;
use consus_protocol::{DEFAULT_PORT, MAX_FRAME_SIZE};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the store server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Time allowed for sending one response to a client.
    pub request_timeout: Duration,
    /// Largest request frame accepted.
    pub max_frame_size: usize,
    /// Engine settings.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            request_timeout: Duration::from_secs(30),
            max_frame_size: MAX_FRAME_SIZE,
            store: StoreConfig::default(),
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the largest accepted frame, capped at the protocol maximum.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.min(MAX_FRAME_SIZE);
        self
    }

    /// Sets the engine configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the engine's lock wait timeout.
    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.store = self.store.with_lock_wait_timeout(timeout);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}
