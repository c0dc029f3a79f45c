//! Benchmark utilities.

use consus_client::{ClientConfig, FramedTransport, LoopbackChannel, LoopbackServer, Session};
use consus_server::{ServerConfig, StoreServer};
use std::sync::Arc;

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

/// Starts an in-process store and opens a session on it.
pub fn in_process_session() -> (Arc<StoreServer>, Session) {
    let server = Arc::new(StoreServer::new(ServerConfig::default()));
    let channel = LoopbackChannel::new(InProcess(Arc::clone(&server)));
    let transport = Arc::new(FramedTransport::new(channel));
    let session = Session::with_transport(ClientConfig::default(), transport)
        .unwrap_or_else(|e| panic!("default client config rejected: {e}"));
    (server, session)
}

/// Generates a payload of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Generates `count` distinct keys.
pub fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{i:08}")).collect()
}
