// Development coordination store role.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{common_controllers, middlewares, spawn_server, Listener};
use crate::config::{Config, ConfigTrait};
use crate::controller;
use crate::http::HttpServer;
use crate::liveness;
use crate::shutdown::GracefulShutdown;
use crate::store::MemoryStore;

/// Serves an in-memory store over the etcd v3 JSON gateway API.
pub struct StoreApp {
    store: MemoryStore,
    listener: Listener,
    server: Arc<HttpServer>,
}

impl StoreApp {
    pub async fn new(shutdown_token: CancellationToken, cfg: &Config) -> Result<Self> {
        let store = MemoryStore::new();
        let listener = Listener::bind(cfg.store_server_port()).await?;

        let mut controllers = common_controllers(Arc::new(liveness::Probe::new()));
        controllers.push(Box::new(controller::StoreApiController::new(store.clone())));
        let server = Arc::new(HttpServer::new(
            shutdown_token,
            cfg.store_server_api_name(),
            controllers,
            middlewares(),
        ));

        Ok(Self {
            store,
            listener,
            server,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.addr
    }

    /// Underlying store, shared with the HTTP API.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub async fn serve(&self, gsh: &GracefulShutdown) -> Result<()> {
        let listener = self.listener.take()?;
        spawn_server(gsh, self.server.clone(), listener, "store");

        info!(
            component = "app",
            role = "store",
            event = "started",
            addr = %self.addr(),
            "application lifecycle"
        );
        Ok(())
    }
}
