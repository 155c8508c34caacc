//! Sluice HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use sluice::backend::{HttpModelBackend, ModelBackend};
use sluice::config::Config;
use sluice::dispatch::{AuthInterceptor, Dispatcher, RequestIdInterceptor, StaticTokenProvider};
use sluice::engine::AnswerEngine;
use sluice::gateway::{HandlerState, create_router_with_state};
use sluice::knowledge::{InMemoryKnowledgeStore, KnowledgeStore};
use sluice::registry::{HealthMonitor, InstanceRegistry};
use sluice::rerank::{HttpRerankBackend, RerankBackend, RerankConfig};
use sluice::web::{DisabledWebSearch, HttpWebSearch, WebSearch};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        instances = config.instances.len(),
        "Sluice starting"
    );

    let client = reqwest::Client::new();
    let members = config
        .instances
        .iter()
        .map(|spec| {
            let backend = HttpModelBackend::with_client(
                client.clone(),
                spec.base_url.clone(),
                config.embed_model.clone(),
                config.generate_model.clone(),
            );
            (spec.clone(), Arc::new(backend) as Arc<dyn ModelBackend>)
        })
        .collect();
    let registry = Arc::new(InstanceRegistry::new(
        config.registry_config(),
        members,
        config.primary_instance.clone(),
    )?);

    let mut dispatcher = Dispatcher::new(Arc::clone(&registry), config.dispatch_config())
        .with_interceptor(Arc::new(RequestIdInterceptor));
    if let Some(token) = &config.api_token {
        dispatcher = dispatcher.with_interceptor(Arc::new(AuthInterceptor::new(Arc::new(
            StaticTokenProvider::new(token.clone()),
        ))));
    }
    let dispatcher = Arc::new(dispatcher);

    let monitor = HealthMonitor::new(Arc::clone(&registry));
    let _health_task = monitor.start();

    let store: Arc<dyn KnowledgeStore> = match &config.kb_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading knowledge base...");
            match InMemoryKnowledgeStore::load(path, &dispatcher).await {
                Ok(store) => {
                    tracing::info!(passages = store.len(), "Knowledge base loaded");
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::warn!("Failed to load knowledge base: {}. Starting empty.", e);
                    Arc::new(InMemoryKnowledgeStore::new())
                }
            }
        }
        None => {
            tracing::warn!("No SLUICE_KB_PATH configured, starting with an empty knowledge base");
            Arc::new(InMemoryKnowledgeStore::new())
        }
    };

    let web: Arc<dyn WebSearch> = match &config.searxng_url {
        Some(url) => Arc::new(HttpWebSearch::new(url.clone(), config.engine_config().web_timeout)?),
        None => {
            tracing::warn!("No SLUICE_SEARXNG_URL configured, web fallback disabled");
            Arc::new(DisabledWebSearch)
        }
    };

    let mut builder = AnswerEngine::builder(Arc::clone(&dispatcher), store)
        .cache_config(config.cache_config())
        .thresholds(config.thresholds()?)
        .web(web)
        .config(config.engine_config());
    if let Some(url) = &config.rerank_url {
        let backend = HttpRerankBackend::new(url.clone(), RerankConfig::default().timeout)?;
        builder = builder.rerank_backend(Arc::new(backend) as Arc<dyn RerankBackend>);
    }
    let engine = Arc::new(builder.build()?);
    let _sweeper_task = engine.cache().start_sweeper();

    let app = create_router_with_state(HandlerState::new(Arc::clone(&engine)));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop();
    engine.cache().stop_sweeper();
    tracing::info!("Sluice shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var(Config::ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
