// Bootstraps store, nodes and gateways on ephemeral ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::app::{GatewayApp, NodeApp, StoreApp};
use crate::config::{self, Admission, Config, Work};
use crate::shutdown::GracefulShutdown;
use crate::store::{CoordinationStore, RemoteStore};

/// Test config: ephemeral ports, 1s lease, no work delay.
pub fn test_config() -> Config {
    let mut cfg = config::new_test_config();
    if let Some(store) = cfg.mesh.store.as_mut() {
        store.lease_ttl = Some(Duration::from_secs(1));
    }
    cfg
}

pub fn with_work_delay(cfg: &mut Config, delay: Duration) {
    if let Some(node) = cfg.mesh.node.as_mut() {
        node.work = Some(Work {
            delay_min: Some(delay),
            delay_max: Some(delay),
        });
    }
}

pub fn with_admission(cfg: &mut Config, enabled: bool, capacity: usize) {
    if let Some(node) = cfg.mesh.node.as_mut() {
        node.admission = Some(Admission {
            enabled,
            capacity: Some(capacity),
        });
    }
}

/// `http://127.0.0.1:{port}{path}` for a server bound on all interfaces.
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", addr.port(), path)
}

/// A served app with its own shutdown scope.
pub struct Running<A> {
    pub app: A,
    token: CancellationToken,
    gsh: GracefulShutdown,
}

impl<A> Running<A> {
    fn new(app: A, token: CancellationToken, gsh: GracefulShutdown) -> Self {
        Self { app, token, gsh }
    }

    /// Cancels the app and waits for its tasks.
    pub async fn stop(&self) {
        self.token.cancel();
        if let Err(e) = self.gsh.await_shutdown().await {
            panic!("app did not stop: {}", e);
        }
    }
}

impl<A> Drop for Running<A> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn scope() -> (CancellationToken, GracefulShutdown) {
    let token = CancellationToken::new();
    let mut gsh = GracefulShutdown::new(token.clone());
    gsh.set_graceful_timeout(Duration::from_secs(5));
    (token, gsh)
}

/// A running coordination store plus helpers to attach nodes and gateways.
pub struct TestMesh {
    pub store: Running<StoreApp>,
    cfg: Config,
}

impl TestMesh {
    pub async fn start() -> Self {
        super::init_test_harness();

        let mut cfg = test_config();
        let (token, gsh) = scope();
        let store = StoreApp::new(token.clone(), &cfg).await.unwrap();
        store.serve(&gsh).await.unwrap();

        let endpoint = url(store.addr(), "");
        if let Some(s) = cfg.mesh.store.as_mut() {
            s.endpoint = Some(endpoint);
        }

        Self {
            store: Running::new(store, token, gsh),
            cfg,
        }
    }

    /// Config pointing at this mesh's store.
    pub fn config(&self) -> Config {
        self.cfg.clone()
    }

    pub fn store_url(&self, path: &str) -> String {
        url(self.store.app.addr(), path)
    }

    /// Client of the store over HTTP, as nodes and gateways use it.
    pub async fn remote_store(&self) -> Arc<dyn CoordinationStore> {
        let cfg = &self.cfg;
        let endpoint = cfg
            .mesh
            .store
            .as_ref()
            .and_then(|s| s.endpoint.clone())
            .unwrap();
        Arc::new(
            RemoteStore::connect(&endpoint, Duration::from_secs(2))
                .await
                .unwrap(),
        )
    }

    pub async fn start_node(&self, cfg: Config) -> Running<NodeApp> {
        let (token, gsh) = scope();
        let node = NodeApp::new(token.clone(), &cfg, self.remote_store().await)
            .await
            .unwrap();
        node.serve(&gsh).await.unwrap();
        Running::new(node, token, gsh)
    }

    pub async fn start_gateway(&self) -> Running<GatewayApp> {
        let (token, gsh) = scope();
        let gateway = GatewayApp::new(token.clone(), &self.cfg, self.remote_store().await)
            .await
            .unwrap();
        gateway.serve(&gsh).await.unwrap();
        Running::new(gateway, token, gsh)
    }
}
