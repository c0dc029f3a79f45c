//! Main store server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use consus_core::TransactionManager;
use consus_protocol::{RequestEnvelope, ReturnCode, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The store server.
///
/// This server answers transaction requests against an in-memory
/// [`TransactionManager`]. It is transport-agnostic: the TCP listener in
/// [`serve`](crate::serve) and in-process loopback channels both feed it
/// encoded messages tagged with a connection ID.
///
/// # Example
///
/// ```
/// use consus_protocol::{Request, RequestEnvelope, ReturnCode};
/// use consus_server::{ServerConfig, StoreServer};
///
/// let server = StoreServer::new(ServerConfig::default());
/// let conn = server.connect();
///
/// let begun = server.handle_request(conn, RequestEnvelope::new(1, Request::Begin { session: [0; 16] }));
/// assert_eq!(begun.code, ReturnCode::Success);
///
/// server.connection_closed(conn);
/// assert_eq!(server.active_transactions(), 0);
/// ```
pub struct StoreServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    next_connection: AtomicU64,
}

impl StoreServer {
    /// Creates a new store server with an empty store.
    pub fn new(config: ServerConfig) -> Self {
        let manager = Arc::new(TransactionManager::new(config.store.clone()));
        Self::with_manager(config, manager)
    }

    /// Creates a store server over an existing transaction manager.
    pub fn with_manager(config: ServerConfig, manager: Arc<TransactionManager>) -> Self {
        let context = Arc::new(HandlerContext::new(config, manager));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            next_connection: AtomicU64::new(1),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the transaction manager.
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.context.manager
    }

    /// Assigns an ID to a newly opened connection.
    pub fn connect(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::SeqCst)
    }

    /// Handles a decoded request.
    pub fn handle_request(&self, connection: u64, envelope: RequestEnvelope) -> Response {
        self.handler.handle(connection, envelope)
    }

    /// Handles an encoded request and returns the encoded response.
    ///
    /// Undecodable input is answered with a `Garbage` response.
    pub fn handle_message(&self, connection: u64, message: &[u8]) -> Vec<u8> {
        let response = match RequestEnvelope::decode(message) {
            Ok(envelope) => self.handle_request(connection, envelope),
            Err(err) => {
                debug!(connection, error = %err, "undecodable request");
                Response::error(0, ReturnCode::Garbage, err.to_string())
            }
        };
        match response.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(connection, error = %err, "cannot encode response");
                Response::error(response.nonce, ReturnCode::Internal, "response encoding failed")
                    .encode()
                    .unwrap_or_default()
            }
        }
    }

    /// Aborts every transaction the connection began and has not finished.
    /// Returns how many were aborted.
    pub fn connection_closed(&self, connection: u64) -> usize {
        let owned = self.context.take_connection(connection);
        let aborted = self.context.manager.abort_all(&owned);
        if aborted > 0 {
            debug!(connection, aborted, "aborted transactions of closed connection");
        }
        aborted
    }

    /// Number of transactions the store still tracks.
    pub fn active_transactions(&self) -> usize {
        self.context.manager.active_count()
    }
}
