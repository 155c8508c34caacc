//! Fixtures shared by unit and integration tests (enabled by the `mock` feature).

use std::sync::Arc;

use crate::backend::{InstanceKind, MockModelBackend, ModelBackend};
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::registry::{InstanceRegistry, InstanceSpec, RegistryConfig};

/// A registry of [`MockModelBackend`]s with a dispatcher over them.
pub struct MockCluster {
    pub registry: Arc<InstanceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub mocks: Vec<Arc<MockModelBackend>>,
}

impl MockCluster {
    /// One `Both`-kind instance per name; the first is the primary.
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, RegistryConfig::default(), DispatchConfig::default())
    }

    pub fn with_config(names: &[&str], registry: RegistryConfig, dispatch: DispatchConfig) -> Self {
        let mocks: Vec<Arc<MockModelBackend>> = names
            .iter()
            .map(|n| Arc::new(MockModelBackend::new(*n)))
            .collect();
        Self::from_mocks(mocks, registry, dispatch)
    }

    pub fn from_mocks(
        mocks: Vec<Arc<MockModelBackend>>,
        registry: RegistryConfig,
        dispatch: DispatchConfig,
    ) -> Self {
        let members = mocks
            .iter()
            .map(|m| {
                (
                    InstanceSpec::new(m.name(), format!("http://{}", m.name()), InstanceKind::Both),
                    Arc::clone(m) as Arc<dyn ModelBackend>,
                )
            })
            .collect();
        let registry = match InstanceRegistry::new(registry, members, None) {
            Ok(r) => Arc::new(r),
            Err(e) => panic!("invalid mock cluster: {e}"),
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), dispatch));
        Self {
            registry,
            dispatcher,
            mocks,
        }
    }

    pub fn mock(&self, name: &str) -> &Arc<MockModelBackend> {
        match self.mocks.iter().find(|m| m.name() == name) {
            Some(m) => m,
            None => panic!("unknown mock instance {name}"),
        }
    }

    /// Marks every instance unhealthy and makes every backend fail.
    pub fn take_all_down(&self) {
        for mock in &self.mocks {
            mock.set_down(true);
            let _ = self.registry.set_health(mock.name(), false);
        }
    }

    pub fn total_generate_calls(&self) -> usize {
        self.mocks.iter().map(|m| m.generate_calls()).sum()
    }
}

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub async fn serve_router(router: axum::Router) -> std::io::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}
