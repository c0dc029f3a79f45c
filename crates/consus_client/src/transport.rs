//! Transport layer abstraction for transaction round trips.

use crate::error::{ClientError, ClientResult};
use consus_protocol::TransactionId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A transport carries transaction operations to the store.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (framed TCP, in-process loopback, mock for testing).
/// Every call is one synchronous round trip; failures of the round trip
/// itself surface as [`ClientError::StoreUnavailable`], store decisions as
/// [`ClientError::Aborted`] or [`ClientError::Server`].
pub trait Transport: Send + Sync {
    /// Starts a transaction and returns its store-assigned ID.
    fn begin(&self, session: &[u8; 16]) -> ClientResult<TransactionId>;

    /// Reads a key; `None` means absent.
    fn get(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
    ) -> ClientResult<Option<Vec<u8>>>;

    /// Writes a key.
    fn put(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> ClientResult<()>;

    /// Commits a transaction.
    fn commit(&self, txid: TransactionId, slot: u64) -> ClientResult<()>;

    /// Aborts a transaction.
    fn abort(&self, txid: TransactionId, slot: u64) -> ClientResult<()>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport and releases its connections.
    fn close(&self) -> ClientResult<()>;
}

/// A mock transport for testing.
///
/// Keeps committed data in memory without any concurrency control, records
/// every call, and can be told to fail upcoming calls.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    next_txid: AtomicU64,
    data: Mutex<HashMap<(Vec<u8>, Vec<u8>), Vec<u8>>>,
    pending: Mutex<HashMap<TransactionId, Vec<((Vec<u8>, Vec<u8>), Vec<u8>)>>>,
    failures: Mutex<VecDeque<ClientError>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            next_txid: AtomicU64::new(1),
            data: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next call fail with `error`. Queued failures are used in
    /// order, one per call.
    pub fn fail_next(&self, error: ClientError) {
        self.failures.lock().push_back(error);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the calls made so far, e.g. `"put 2"` for a put at slot 2.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn enter(&self, call: String) -> ClientResult<()> {
        self.calls.lock().push(call);
        if !self.is_connected() {
            return Err(ClientError::store_unavailable("not connected"));
        }
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn begin(&self, _session: &[u8; 16]) -> ClientResult<TransactionId> {
        self.enter("begin".into())?;
        let number = self.next_txid.fetch_add(1, Ordering::SeqCst);
        let txid = TransactionId::new(number, number);
        self.pending.lock().insert(txid, Vec::new());
        Ok(txid)
    }

    fn get(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
    ) -> ClientResult<Option<Vec<u8>>> {
        self.enter(format!("get {slot}"))?;
        let addr = (table.to_vec(), key.to_vec());
        let own = self.pending.lock().get(&txid).and_then(|writes| {
            writes
                .iter()
                .rev()
                .find(|(k, _)| *k == addr)
                .map(|(_, v)| v.clone())
        });
        Ok(own.or_else(|| self.data.lock().get(&addr).cloned()))
    }

    fn put(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> ClientResult<()> {
        self.enter(format!("put {slot}"))?;
        self.pending
            .lock()
            .entry(txid)
            .or_default()
            .push(((table.to_vec(), key.to_vec()), value.to_vec()));
        Ok(())
    }

    fn commit(&self, txid: TransactionId, slot: u64) -> ClientResult<()> {
        self.enter(format!("commit {slot}"))?;
        let writes = self.pending.lock().remove(&txid).unwrap_or_default();
        self.data.lock().extend(writes);
        Ok(())
    }

    fn abort(&self, txid: TransactionId, slot: u64) -> ClientResult<()> {
        self.enter(format!("abort {slot}"))?;
        self.pending.lock().remove(&txid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
