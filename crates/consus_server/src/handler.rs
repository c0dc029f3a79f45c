//! Request handlers for transaction operations.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use consus_core::{TableKey, TransactionManager};
use consus_protocol::{Request, RequestEnvelope, Response, TransactionId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Transaction engine (shared across all handlers).
    pub manager: Arc<TransactionManager>,
    /// Open transactions by the connection that began them.
    owners: Mutex<HashMap<u64, HashSet<TransactionId>>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, manager: Arc<TransactionManager>) -> Self {
        Self {
            config,
            manager,
            owners: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, connection: u64, txid: TransactionId) {
        self.owners.lock().entry(connection).or_default().insert(txid);
    }

    /// Drops ownership of a finished transaction. Pooled clients may finish
    /// a transaction on a different connection than the one that began it.
    fn release(&self, txid: TransactionId) {
        for set in self.owners.lock().values_mut() {
            if set.remove(&txid) {
                break;
            }
        }
    }

    /// Forgets a connection and returns the transactions it still owned.
    pub(crate) fn take_connection(&self, connection: u64) -> Vec<TransactionId> {
        self.owners
            .lock()
            .remove(&connection)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    /// Number of transactions owned by `connection`.
    pub fn owned_by(&self, connection: u64) -> usize {
        self.owners.lock().get(&connection).map_or(0, HashSet::len)
    }
}

/// Handler for transaction requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a request arriving on `connection`. Refusals come back as
    /// error responses carrying the matching return code.
    pub fn handle(&self, connection: u64, envelope: RequestEnvelope) -> Response {
        let nonce = envelope.nonce;
        let kind = envelope.request.type_name();
        let txid = envelope.request.txid();
        match self.dispatch(connection, nonce, envelope.request) {
            Ok(response) => response,
            Err(err) => {
                debug!(connection, request = kind, txid = ?txid, error = %err, "request refused");
                Response::error(nonce, err.return_code(), err.to_string())
            }
        }
    }

    fn dispatch(&self, connection: u64, nonce: u64, request: Request) -> ServerResult<Response> {
        match request {
            Request::Begin { session } => Ok(self.handle_begin(connection, nonce, &session)),
            Request::Get {
                txid,
                slot,
                table,
                key,
            } => self.handle_get(nonce, txid, slot, TableKey::new(table, key)),
            Request::Put {
                txid,
                slot,
                table,
                key,
                value,
            } => self.handle_put(nonce, txid, slot, TableKey::new(table, key), value),
            Request::Commit { txid, slot } => self.handle_commit(nonce, txid, slot),
            Request::Abort { txid, slot } => self.handle_abort(nonce, txid, slot),
        }
    }

    /// Handles a begin request.
    pub fn handle_begin(&self, connection: u64, nonce: u64, session: &[u8; 16]) -> Response {
        let txid = self.context.manager.begin();
        self.context.register(connection, txid);
        debug!(connection, session = %Uuid::from_bytes(*session), %txid, "begin");
        Response::begun(nonce, txid)
    }

    /// Handles a get request.
    pub fn handle_get(
        &self,
        nonce: u64,
        txid: TransactionId,
        slot: u64,
        key: TableKey,
    ) -> ServerResult<Response> {
        let value = self.context.manager.get(txid, slot, &key)?;
        Ok(Response::value(nonce, value))
    }

    /// Handles a put request. May block on a lock.
    pub fn handle_put(
        &self,
        nonce: u64,
        txid: TransactionId,
        slot: u64,
        key: TableKey,
        value: Vec<u8>,
    ) -> ServerResult<Response> {
        self.context.manager.put(txid, slot, key, value)?;
        Ok(Response::success(nonce))
    }

    /// Handles a commit request.
    pub fn handle_commit(
        &self,
        nonce: u64,
        txid: TransactionId,
        slot: u64,
    ) -> ServerResult<Response> {
        let result = self.context.manager.commit(txid, slot);
        // Commit finishes the transaction unless the request itself was invalid.
        if result.is_ok() || matches!(result, Err(ref e) if e.is_aborted()) {
            self.context.release(txid);
        }
        result?;
        Ok(Response::success(nonce))
    }

    /// Handles an abort request.
    pub fn handle_abort(
        &self,
        nonce: u64,
        txid: TransactionId,
        slot: u64,
    ) -> ServerResult<Response> {
        self.context.manager.abort(txid, slot)?;
        self.context.release(txid);
        Ok(Response::success(nonce))
    }
}
