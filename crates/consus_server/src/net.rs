//! TCP front end.

use crate::error::{ServerError, ServerResult};
use crate::server::StoreServer;
use consus_protocol::{encode_frame, FrameDecoder};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Binds a listener to the configured address.
pub async fn bind(server: &StoreServer) -> ServerResult<TcpListener> {
    let listener = TcpListener::bind(server.config().bind_addr).await?;
    Ok(listener)
}

/// Accepts connections until `shutdown` resolves.
///
/// Each connection runs on its own task; requests are handled on the
/// blocking pool since `put` may wait for a lock. Connections beyond
/// `max_connections` are closed on accept. When a connection ends, every
/// transaction it began and left open is aborted.
pub async fn serve<F>(server: Arc<StoreServer>, listener: TcpListener, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()>,
{
    let limit = Arc::new(Semaphore::new(server.config().max_connections));
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "store listening");
    }

    let mut shutdown = std::pin::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("store shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                    warn!(%peer, "connection limit reached, closing");
                    continue;
                };
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let connection = server.connect();
                    debug!(connection, %peer, "connection opened");
                    if let Err(e) = run_connection(&server, connection, stream).await {
                        debug!(connection, %peer, error = %e, "connection failed");
                    }
                    server.connection_closed(connection);
                    debug!(connection, %peer, "connection closed");
                    drop(permit);
                });
            }
        }
    }
}

async fn run_connection(
    server: &Arc<StoreServer>,
    connection: u64,
    mut stream: TcpStream,
) -> ServerResult<()> {
    stream.set_nodelay(true)?;
    let write_timeout = server.config().request_timeout;
    let mut decoder = FrameDecoder::with_limit(server.config().max_frame_size);

    loop {
        while let Some(frame) = decoder.next_frame()? {
            let worker = Arc::clone(server);
            let reply = tokio::task::spawn_blocking(move || worker.handle_message(connection, &frame))
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            let out = encode_frame(&reply)?;
            tokio::time::timeout(write_timeout, stream.write_all(&out))
                .await
                .map_err(|_| ServerError::Internal("response write timed out".into()))??;
        }

        if stream.read_buf(decoder.buffer_mut()).await? == 0 {
            return Ok(());
        }
    }
}

/// A server running on a background task.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ServerResult<()>>,
}

impl ServerHandle {
    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for the accept loop to end.
    pub async fn shutdown(mut self) -> ServerResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?
    }
}

/// Binds to the configured address and serves on a background task.
///
/// The server stops when [`ServerHandle::shutdown`] is called or the handle
/// is dropped.
pub async fn spawn(server: Arc<StoreServer>) -> ServerResult<ServerHandle> {
    let listener = bind(&server).await?;
    let addr = listener.local_addr()?;
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(serve(server, listener, async move {
        let _ = stopped.await;
    }));
    Ok(ServerHandle {
        addr,
        stop: Some(stop),
        task,
    })
}
