//! TCP channel to a store cluster.

use crate::address::Endpoint;
use crate::config::ClientConfig;
use crate::framed::Channel;
use consus_protocol::{read_frame, write_frame, ProtocolError};
use parking_lot::Mutex;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Length-prefixed frames over pooled TCP connections.
///
/// Each exchange borrows an idle connection or opens a new one, trying the
/// endpoints in order. Connections that fail mid-exchange are dropped;
/// healthy ones return to the pool and stay open until [`Channel::close`],
/// because the store aborts the open transactions of a connection that
/// goes away.
pub struct TcpChannel {
    endpoints: Vec<Endpoint>,
    connect_timeout: Duration,
    request_timeout: Duration,
    idle: Mutex<Vec<TcpStream>>,
    closed: AtomicBool,
}

impl TcpChannel {
    /// Creates a channel; no connection is made until the first exchange.
    pub fn new(endpoints: Vec<Endpoint>, config: &ClientConfig) -> Self {
        Self {
            endpoints,
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the endpoints in connection order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Number of pooled connections not currently in use.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for endpoint in &self.endpoints {
            let addrs = match (endpoint.host.as_str(), endpoint.port).to_socket_addrs() {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(%endpoint, error = %e, "cannot resolve endpoint");
                    last_error = Some(e);
                    continue;
                }
            };
            for addr in addrs {
                match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                    Ok(stream) => {
                        stream.set_nodelay(true)?;
                        stream.set_read_timeout(Some(self.request_timeout))?;
                        stream.set_write_timeout(Some(self.request_timeout))?;
                        debug!(%endpoint, %addr, "connected");
                        return Ok(stream);
                    }
                    Err(e) => {
                        debug!(%endpoint, %addr, error = %e, "connect failed");
                        last_error = Some(e);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no endpoint configured")
        }))
    }
}

impl Channel for TcpChannel {
    fn exchange(&self, message: &[u8]) -> io::Result<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel closed"));
        }

        let pooled = self.idle.lock().pop();
        let mut stream = match pooled {
            Some(stream) => stream,
            None => self.connect()?,
        };

        let result = write_frame(&mut stream, message).and_then(|()| read_frame(&mut stream));
        match result {
            Ok(reply) => {
                if self.closed.load(Ordering::SeqCst) {
                    let _ = stream.shutdown(Shutdown::Both);
                } else {
                    self.idle.lock().push(stream);
                }
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "dropping broken connection");
                let _ = stream.shutdown(Shutdown::Both);
                Err(into_io(e))
            }
        }
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for stream in self.idle.lock().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn into_io(err: ProtocolError) -> io::Error {
    match err {
        ProtocolError::UnexpectedEof => io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by store",
        ),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
