//! Serve command implementation.

use consus_server::{ServerConfig, StoreServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds the server configuration from command-line flags.
pub fn config(bind: SocketAddr, lock_timeout_ms: u64, max_connections: usize) -> ServerConfig {
    ServerConfig::new(bind)
        .with_lock_wait_timeout(Duration::from_millis(lock_timeout_ms))
        .with_max_connections(max_connections)
}

/// Runs the serve command until interrupted.
pub fn run(
    bind: SocketAddr,
    lock_timeout_ms: u64,
    max_connections: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(StoreServer::new(config(bind, lock_timeout_ms, max_connections)));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let listener = consus_server::bind(&server).await?;
        consus_server::serve(Arc::clone(&server), listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
        info!(
            open = server.active_transactions(),
            "store stopped"
        );
        Ok::<_, consus_server::ServerError>(())
    })?;

    Ok(())
}
