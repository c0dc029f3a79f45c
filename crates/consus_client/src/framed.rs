//! Message transport over a request/response channel.
//!
//! [`FramedTransport`] turns each operation into a [`RequestEnvelope`],
//! sends the encoded message through a [`Channel`] and maps the store's
//! [`Response`] back to a result. The channel only moves opaque message
//! bytes, so TCP, in-process loopback and test doubles all plug in here.

use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;
use consus_protocol::{Request, RequestEnvelope, ReturnCode, Response, TransactionId};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::warn;

/// Request/response channel abstraction.
///
/// Implement this trait to provide the actual message exchange.
pub trait Channel: Send + Sync {
    /// Sends one encoded request and returns the encoded response.
    fn exchange(&self, message: &[u8]) -> io::Result<Vec<u8>>;

    /// Checks if the channel is usable.
    fn is_healthy(&self) -> bool;

    /// Releases any connections held by the channel.
    fn close(&self) {}
}

/// CBOR message transport over a [`Channel`].
pub struct FramedTransport<C: Channel> {
    channel: C,
    next_nonce: AtomicU64,
    connected: AtomicBool,
}

impl<C: Channel> FramedTransport<C> {
    /// Creates a new transport over `channel`.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            next_nonce: AtomicU64::new(1),
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Performs one round trip and checks the nonce of the reply.
    fn round_trip(&self, request: Request) -> ClientResult<Response> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::store_unavailable("transport closed"));
        }

        let kind = request.type_name();
        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let message = RequestEnvelope::new(nonce, request).encode()?;

        let reply = self.channel.exchange(&message).map_err(|e| {
            warn!(request = kind, error = %e, "round trip failed");
            ClientError::store_unavailable(e.to_string())
        })?;

        let response = Response::decode(&reply)?;
        if response.nonce != nonce {
            return Err(ClientError::Protocol(format!(
                "{kind} response carries nonce {} instead of {nonce}",
                response.nonce
            )));
        }
        Ok(response)
    }

    /// Performs a round trip that must end in a success code.
    fn call(&self, request: Request) -> ClientResult<Response> {
        let response = self.round_trip(request)?;
        match response.code {
            ReturnCode::Success | ReturnCode::LessDurable => Ok(response),
            code => Err(ClientError::from_code(code, response.message)),
        }
    }
}

impl<C: Channel> Transport for FramedTransport<C> {
    fn begin(&self, session: &[u8; 16]) -> ClientResult<TransactionId> {
        let response = self.call(Request::Begin { session: *session })?;
        response
            .txid
            .ok_or_else(|| ClientError::Protocol("begin response without txid".into()))
    }

    fn get(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
    ) -> ClientResult<Option<Vec<u8>>> {
        let response = self.round_trip(Request::Get {
            txid,
            slot,
            table: table.to_vec(),
            key: key.to_vec(),
        })?;
        match response.code {
            ReturnCode::NotFound => Ok(None),
            ReturnCode::Success | ReturnCode::LessDurable => match response.value {
                Some(value) => Ok(Some(value)),
                None => Err(ClientError::Protocol("get response without value".into())),
            },
            code => Err(ClientError::from_code(code, response.message)),
        }
    }

    fn put(
        &self,
        txid: TransactionId,
        slot: u64,
        table: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> ClientResult<()> {
        self.call(Request::Put {
            txid,
            slot,
            table: table.to_vec(),
            key: key.to_vec(),
            value: value.to_vec(),
        })
        .map(|_| ())
    }

    fn commit(&self, txid: TransactionId, slot: u64) -> ClientResult<()> {
        self.call(Request::Commit { txid, slot }).map(|_| ())
    }

    fn abort(&self, txid: TransactionId, slot: u64) -> ClientResult<()> {
        self.call(Request::Abort { txid, slot }).map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.channel.is_healthy()
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.channel.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Replies with a fixed response, echoing the request nonce unless told
    /// otherwise.
    struct TestChannel {
        reply: Mutex<Option<Response>>,
        echo_nonce: bool,
        fail: bool,
    }

    impl TestChannel {
        fn replying(response: Response) -> Self {
            Self {
                reply: Mutex::new(Some(response)),
                echo_nonce: true,
                fail: false,
            }
        }
    }

    impl Channel for TestChannel {
        fn exchange(&self, message: &[u8]) -> io::Result<Vec<u8>> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            let request = RequestEnvelope::decode(message)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            let mut response = self
                .reply
                .lock()
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no reply set"))?;
            if self.echo_nonce {
                response.nonce = request.nonce;
            }
            response
                .encode()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    fn txid() -> TransactionId {
        TransactionId::new(3, 4)
    }

    #[test]
    fn begin_returns_txid() {
        let transport = FramedTransport::new(TestChannel::replying(Response::begun(0, txid())));
        assert_eq!(transport.begin(&[1u8; 16]).unwrap(), txid());
    }

    #[test]
    fn get_maps_not_found_to_none() {
        let transport = FramedTransport::new(TestChannel::replying(Response::value(0, None)));
        assert_eq!(transport.get(txid(), 1, b"t", b"k").unwrap(), None);

        let transport = FramedTransport::new(TestChannel::replying(Response::value(
            0,
            Some(b"v".to_vec()),
        )));
        assert_eq!(transport.get(txid(), 1, b"t", b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn aborted_code_is_abort_error() {
        let transport = FramedTransport::new(TestChannel::replying(Response::error(
            0,
            ReturnCode::Aborted,
            "wounded",
        )));
        let err = transport.commit(txid(), 2).unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(err.to_string(), "transaction aborted: wounded");
    }

    #[test]
    fn channel_failure_is_unavailable() {
        let transport = FramedTransport::new(TestChannel {
            reply: Mutex::new(None),
            echo_nonce: true,
            fail: true,
        });
        let err = transport.put(txid(), 1, b"t", b"k", b"v").unwrap_err();
        assert!(matches!(err, ClientError::StoreUnavailable { .. }));
        assert!(!err.is_aborted());
    }

    #[test]
    fn mismatched_nonce_is_protocol_error() {
        let transport = FramedTransport::new(TestChannel {
            reply: Mutex::new(Some(Response::success(999))),
            echo_nonce: false,
            fail: false,
        });
        assert!(matches!(
            transport.abort(txid(), 1),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn closed_transport_refuses_requests() {
        let transport = FramedTransport::new(TestChannel::replying(Response::success(0)));
        transport.close().unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.commit(txid(), 1),
            Err(ClientError::StoreUnavailable { .. })
        ));
    }
}
