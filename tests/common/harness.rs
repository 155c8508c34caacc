//! Test server harness.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sluice::engine::{AnswerEngine, EngineConfig};
use sluice::gateway::{HandlerState, create_router_with_state};
use sluice::knowledge::{InMemoryKnowledgeStore, KnowledgeStore};
use sluice::testing::MockCluster;
use sluice::web::{MockWebSearch, WebSearch};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{framework_results, support_store};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct TestServerConfig {
    pub instances: Vec<&'static str>,
    pub with_web: bool,
    /// JSONL file to load instead of the built-in support store.
    pub kb_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            instances: vec!["gpu0", "gpu1"],
            with_web: true,
            kb_path: None,
            engine: EngineConfig::default(),
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub cluster: MockCluster,
    pub web: Arc<MockWebSearch>,
    pub engine: Arc<AnswerEngine>,
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

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Spawns a gateway over mock model instances and a mock web search on an ephemeral port.
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let cluster = MockCluster::new(&config.instances);
    let web = Arc::new(MockWebSearch::new(framework_results()));

    let store: Arc<dyn KnowledgeStore> = match &config.kb_path {
        Some(path) => Arc::new(
            InMemoryKnowledgeStore::load(path, &cluster.dispatcher)
                .await
                .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?,
        ),
        None => support_store(),
    };

    let mut builder = AnswerEngine::builder(Arc::clone(&cluster.dispatcher), store)
        .config(config.engine.clone());
    if config.with_web {
        builder = builder.web(Arc::clone(&web) as Arc<dyn WebSearch>);
    }
    let engine = Arc::new(
        builder
            .build()
            .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?,
    );

    let app = create_router_with_state(HandlerState::new(Arc::clone(&engine)));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        cluster,
        web,
        engine,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}
