//! Sessions against a store listening on a real socket.

use consus_client::{ClientConfig, ClientError, Session, TransactionState};
use consus_server::{ServerConfig, StoreServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn start() -> (Arc<StoreServer>, consus_server::ServerHandle) {
    let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_lock_wait_timeout(Duration::from_millis(200));
    let server = Arc::new(StoreServer::new(config));
    let handle = consus_server::spawn(Arc::clone(&server)).await.unwrap();
    (server, handle)
}

async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_write_read_over_tcp() {
    let (_server, handle) = start().await;
    let addr = handle.local_addr().to_string();

    blocking(move || {
        let session = Session::connect(&addr).unwrap();

        let mut t = session.begin_transaction().unwrap();
        assert_eq!(t.get("tbl", "k").unwrap(), None);
        t.commit().unwrap();

        let mut t = session.begin_transaction().unwrap();
        t.put("tbl", "k", "v").unwrap();
        t.commit().unwrap();

        let mut t = session.begin_transaction().unwrap();
        assert_eq!(t.get("tbl", "k").unwrap(), Some(b"v".to_vec()));
        t.commit().unwrap();

        session.close().unwrap();
    })
    .await;

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn separate_host_and_port() {
    let (_server, handle) = start().await;
    let port = handle.local_addr().port();

    blocking(move || {
        let session = Session::connect_with_port("127.0.0.1", port).unwrap();
        let mut t = session.begin_transaction().unwrap();
        t.abort().unwrap();
    })
    .await;

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn falls_through_dead_endpoint() {
    let (_server, handle) = start().await;
    let live = handle.local_addr();

    // Grab a port nobody listens on.
    let dead = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    blocking(move || {
        let session = Session::connect(format!("{dead},{live}")).unwrap();
        let mut t = session.begin_transaction().unwrap();
        t.commit().unwrap();
    })
    .await;

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closing_session_releases_locks_on_store() {
    let (server, handle) = start().await;
    let addr = handle.local_addr().to_string();

    blocking(move || {
        let session = Session::connect(&addr).unwrap();
        let mut t = session.begin_transaction().unwrap();
        t.put("tbl", "held", "x").unwrap();
        session.close().unwrap();
        assert!(matches!(t.commit(), Err(ClientError::Aborted { .. })));
        assert_eq!(t.state(), TransactionState::Aborted);
    })
    .await;

    let mut released = false;
    for _ in 0..100 {
        if server.active_transactions() == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released);

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lost_connection_aborts_every_transaction_on_it() {
    let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_lock_wait_timeout(Duration::from_secs(1));
    let server = Arc::new(StoreServer::new(config));
    let handle = consus_server::spawn(Arc::clone(&server)).await.unwrap();
    let addr = handle.local_addr().to_string();

    blocking(move || {
        let config = ClientConfig::new()
            .with_endpoint(addr)
            .with_request_timeout(Duration::from_millis(300));
        let session = Session::from_config(config).unwrap();

        // All three share the session's single pooled connection.
        let mut unrelated = session.begin_transaction().unwrap();
        unrelated.put("tbl", "own", "u").unwrap();
        let mut older = session.begin_transaction().unwrap();
        older.put("tbl", "k", "o").unwrap();
        let mut younger = session.begin_transaction().unwrap();

        // The store holds the reply past the client's timeout, so the
        // connection is dropped.
        let err = younger.put("tbl", "k", "y").unwrap_err();
        assert!(matches!(err, ClientError::StoreUnavailable { .. }), "{err}");
        assert_eq!(younger.state(), TransactionState::Active);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while server.active_transactions() > 0 {
            assert!(std::time::Instant::now() < deadline, "store kept transactions open");
            std::thread::sleep(Duration::from_millis(20));
        }

        for txn in [&mut unrelated, &mut older] {
            let err = txn.commit().unwrap_err();
            assert!(err.is_aborted(), "{err}");
            assert_eq!(txn.state(), TransactionState::Aborted);
        }
        younger.abort().unwrap();
        assert_eq!(younger.state(), TransactionState::Aborted);

        let mut check = session.begin_transaction().unwrap();
        assert_eq!(check.get("tbl", "own").unwrap(), None);
        assert_eq!(check.get("tbl", "k").unwrap(), None);
        check.commit().unwrap();
        assert_eq!(server.manager().orphaned_count(), 0);
    })
    .await;

    handle.shutdown().await.unwrap();
}

#[test]
fn unreachable_store_is_unavailable() {
    let dead = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = ClientConfig::new()
        .with_endpoint(dead.to_string())
        .with_connect_timeout(Duration::from_millis(200));
    let session = Session::from_config(config).unwrap();

    let err = session.begin_transaction().unwrap_err();
    assert!(matches!(err, ClientError::StoreUnavailable { .. }), "{err}");
    assert!(err.is_retryable());
}
