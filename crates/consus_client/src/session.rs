//! Client sessions.

use crate::address::{decode_utf8, parse_host_with_port, Endpoint};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::framed::FramedTransport;
use crate::tcp::TcpChannel;
use crate::transaction::Transaction;
use crate::transport::Transport;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One client's logical connection to a store cluster.
///
/// A session holds no transaction state of its own and may run any number
/// of transactions, from any number of threads. Cloning a session shares
/// it; the connections close when [`Session::close`] is called or the last
/// clone and its transactions are dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    endpoints: Vec<Endpoint>,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
}

impl Session {
    /// Creates a session for the default endpoint, `127.0.0.1:1982`.
    pub fn new() -> Self {
        let config = ClientConfig::default();
        let endpoints = vec![Endpoint::default()];
        let transport = Arc::new(FramedTransport::new(TcpChannel::new(
            endpoints.clone(),
            &config,
        )));
        Self::build(config, endpoints, transport)
    }

    /// Creates a session from an address string: a host, `host:port`, a
    /// bracketed IPv6 literal or a comma-separated list of these.
    pub fn connect(address: impl AsRef<[u8]>) -> ClientResult<Self> {
        let address = decode_utf8(address.as_ref())?;
        Self::from_config(ClientConfig::new().with_endpoint(address))
    }

    /// Creates a session from a single host and a separate port.
    ///
    /// Fails if `host` already names a port or lists several hosts.
    pub fn connect_with_port(host: impl AsRef<[u8]>, port: u16) -> ClientResult<Self> {
        if port == 0 {
            return Err(ClientError::configuration("port must be in 1-65535"));
        }
        let endpoint = parse_host_with_port(host, port)?;
        Self::from_config(
            ClientConfig::new()
                .with_endpoint(endpoint.to_string())
                .with_default_port(port),
        )
    }

    /// Creates a session from a configuration, connecting over TCP.
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let endpoints = config.resolve()?;
        let transport = Arc::new(FramedTransport::new(TcpChannel::new(
            endpoints.clone(),
            &config,
        )));
        Ok(Self::build(config, endpoints, transport))
    }

    /// Creates a session over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        let endpoints = config.resolve()?;
        Ok(Self::build(config, endpoints, transport))
    }

    fn build(config: ClientConfig, endpoints: Vec<Endpoint>, transport: Arc<dyn Transport>) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, endpoints = %crate::address::join(&endpoints), "session created");
        Self {
            inner: Arc::new(SessionInner {
                id,
                endpoints,
                config,
                transport,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the session ID sent with every begin request.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns the resolved endpoints, in connection order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.inner.endpoints
    }

    /// Returns the configuration the session was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns true once [`Session::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Starts a transaction.
    ///
    /// The store assigns the transaction its identifier and age during this
    /// call, so transactions begun earlier take precedence in lock conflicts.
    pub fn begin_transaction(&self) -> ClientResult<Transaction> {
        if self.is_closed() {
            return Err(ClientError::store_unavailable("session closed"));
        }
        let txid = self.inner.transport.begin(self.inner.id.as_bytes())?;
        debug!(session = %self.inner.id, %txid, "transaction begun");
        Ok(Transaction::new(self.clone(), txid))
    }

    /// Closes the session's connections.
    ///
    /// The store aborts every transaction still open on them; local
    /// transaction handles fail afterwards with `StoreUnavailable`.
    pub fn close(&self) -> ClientResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(session = %self.inner.id, "session closed");
        self.inner.transport.close()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("endpoints", &self.inner.endpoints)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(err) = self.transport.close() {
                debug!(session = %self.id, error = %err, "close on drop failed");
            }
        }
    }
}
