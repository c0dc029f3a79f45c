//! In-process channel for tests and benchmarks.

use crate::framed::Channel;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for stores that can handle loopback messages.
///
/// `connection` identifies the emulated connection so the store can clean
/// up after it the way it would after a closed socket.
pub trait LoopbackServer {
    /// Opens an emulated connection and returns its ID.
    fn connect(&self) -> u64;

    /// Handles one encoded request and returns the encoded response.
    fn handle_message(&self, connection: u64, message: &[u8]) -> Vec<u8>;

    /// Called when the emulated connection closes.
    fn disconnect(&self, connection: u64);
}

/// A channel that routes messages directly to an in-process store.
///
/// Useful for testing without actual network overhead. Each channel acts
/// as one connection.
pub struct LoopbackChannel<S: LoopbackServer> {
    server: S,
    connection: u64,
    open: AtomicBool,
}

impl<S: LoopbackServer + Send + Sync> LoopbackChannel<S> {
    /// Creates a new loopback channel connected to the given server.
    pub fn new(server: S) -> Self {
        let connection = server.connect();
        Self {
            server,
            connection,
            open: AtomicBool::new(true),
        }
    }

    /// Returns the emulated connection ID.
    pub fn connection(&self) -> u64 {
        self.connection
    }
}

impl<S: LoopbackServer + Send + Sync> Channel for LoopbackChannel<S> {
    fn exchange(&self, message: &[u8]) -> io::Result<Vec<u8>> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "loopback closed"));
        }
        Ok(self.server.handle_message(self.connection, message))
    }

    fn is_healthy(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.server.disconnect(self.connection);
        }
    }
}
