// Discovery gateway role.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{common_controllers, middlewares, spawn_server, Listener};
use crate::config::{Config, ConfigTrait};
use crate::controller;
use crate::discovery::{Forwarder, Gateway, HttpForwarder};
use crate::http::HttpServer;
use crate::liveness;
use crate::model::Keyspace;
use crate::shutdown::GracefulShutdown;
use crate::store::CoordinationStore;

pub struct GatewayApp {
    gateway: Arc<Gateway>,
    listener: Listener,
    server: Arc<HttpServer>,
}

impl GatewayApp {
    pub async fn new(
        shutdown_token: CancellationToken,
        cfg: &Config,
        store: Arc<dyn CoordinationStore>,
    ) -> Result<Self> {
        Self::with_forwarder(shutdown_token, cfg, store, Arc::new(HttpForwarder::new())).await
    }

    pub async fn with_forwarder(
        shutdown_token: CancellationToken,
        cfg: &Config,
        store: Arc<dyn CoordinationStore>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self> {
        let keyspace = Keyspace::new(cfg.service_prefix(), cfg.service_name());
        let gateway = Arc::new(Gateway::new(store, keyspace, forwarder));
        let listener = Listener::bind(cfg.gateway_port()).await?;

        let mut controllers = common_controllers(Arc::new(liveness::Probe::new()));
        controllers.push(Box::new(controller::GatewayController::new(gateway.clone())));
        let server = Arc::new(HttpServer::new(
            shutdown_token,
            cfg.gateway_api_name(),
            controllers,
            middlewares(),
        ));

        Ok(Self {
            gateway,
            listener,
            server,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.addr
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub async fn serve(&self, gsh: &GracefulShutdown) -> Result<()> {
        let listener = self.listener.take()?;
        spawn_server(gsh, self.server.clone(), listener, "gateway");

        info!(
            component = "app",
            role = "gateway",
            event = "started",
            addr = %self.addr(),
            service = self.gateway.keyspace().service(),
            "application lifecycle"
        );
        Ok(())
    }
}
