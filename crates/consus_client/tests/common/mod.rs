//! Shared helpers for client integration tests.

#![allow(dead_code)]

use consus_client::{ClientConfig, FramedTransport, LoopbackChannel, LoopbackServer, Session};
use consus_server::{ServerConfig, StoreServer};
use std::sync::Arc;
use std::time::Duration;

/// Routes loopback channels into an in-process store server.
#[derive(Clone)]
pub struct InProcess(pub Arc<StoreServer>);

impl LoopbackServer for InProcess {
    fn connect(&self) -> u64 {
        self.0.connect()
    }

    fn handle_message(&self, connection: u64, message: &[u8]) -> Vec<u8> {
        self.0.handle_message(connection, message)
    }

    fn disconnect(&self, connection: u64) {
        self.0.connection_closed(connection);
    }
}

/// A store with a short lock wait so contention tests finish quickly.
pub fn store() -> Arc<StoreServer> {
    store_with_lock_wait(Duration::from_millis(200))
}

pub fn store_with_lock_wait(timeout: Duration) -> Arc<StoreServer> {
    let config = ServerConfig::default().with_lock_wait_timeout(timeout);
    Arc::new(StoreServer::new(config))
}

/// Opens a session whose single connection runs in process.
pub fn session(server: &Arc<StoreServer>) -> Session {
    let channel = LoopbackChannel::new(InProcess(Arc::clone(server)));
    let transport = Arc::new(FramedTransport::new(channel));
    Session::with_transport(ClientConfig::default(), transport).unwrap()
}
