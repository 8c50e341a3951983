//! Test server harness: the real router on an ephemeral port, mock providers behind it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use solarscan::gateway::{HandlerState, create_router_with_state};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{Mocks, local_cache};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

pub struct TestServer {
    pub addr: SocketAddr,
    pub mocks: Mocks,
    pub cache_dir: TempDir,
    pub scratch_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn spawn_test_server(mocks: Mocks) -> std::io::Result<TestServer> {
    let cache_dir = TempDir::new()?;
    let scratch_dir = TempDir::new()?;
    let orchestrator = mocks.orchestrator(local_cache(&cache_dir), &scratch_dir);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router_with_state(HandlerState::new(Arc::new(orchestrator)));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(addr).await?;

    Ok(TestServer {
        addr,
        mocks,
        cache_dir,
        scratch_dir,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}

async fn wait_for_server_ready(addr: SocketAddr) -> std::io::Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS);
    loop {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("server at {addr} did not start"),
            ));
        }
        tokio::time::sleep(Duration::from_millis(STARTUP_POLL_INTERVAL_MS)).await;
    }
}
