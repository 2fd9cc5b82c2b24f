// Compute node role.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{common_controllers, middlewares, spawn_server, Listener};
use crate::admission::AdmissionGate;
use crate::compute::{Multiplier, WorkDelay};
use crate::config::{Config, ConfigTrait};
use crate::controller;
use crate::http::HttpServer;
use crate::liveness;
use crate::model::{Keyspace, ServiceInstance};
use crate::registry::{Registrar, RegistrationState};
use crate::shutdown::GracefulShutdown;
use crate::store::CoordinationStore;

/// Not alive once the registration lease is lost.
struct RegistrationLiveness {
    state: watch::Receiver<RegistrationState>,
}

impl liveness::Service for RegistrationLiveness {
    fn name(&self) -> &str {
        "registration"
    }

    fn is_alive(&self) -> bool {
        *self.state.borrow() != RegistrationState::Expired
    }
}

/// Self-registering compute node.
///
/// The listener is bound before registering so the advertised port is the
/// real one, including when the configured port is 0.
pub struct NodeApp {
    instance: ServiceInstance,
    gate: Arc<AdmissionGate>,
    registrar: Arc<Registrar>,
    listener: Listener,
    server: Arc<HttpServer>,
}

impl NodeApp {
    pub async fn new(
        shutdown_token: CancellationToken,
        cfg: &Config,
        store: Arc<dyn CoordinationStore>,
    ) -> Result<Self> {
        let listener = Listener::bind(cfg.node_port()).await?;
        let instance = ServiceInstance::new(
            cfg.advertise_address(),
            listener.addr.port(),
            cfg.node_metadata(),
        );

        let gate = Arc::new(AdmissionGate::from_settings(
            cfg.admission_enabled(),
            cfg.admission_capacity(),
        ));
        let (delay_min, delay_max) = cfg.work_delay();
        let multiplier = Arc::new(Multiplier::new(WorkDelay::new(delay_min, delay_max)));

        let keyspace = Keyspace::new(cfg.service_prefix(), cfg.service_name());
        let registrar = Arc::new(Registrar::new(store, keyspace, cfg.lease_ttl()));

        let probe = Arc::new(liveness::Probe::new());
        probe.watch(vec![Arc::new(RegistrationLiveness {
            state: registrar.subscribe(),
        }) as Arc<dyn liveness::Service>]);

        let mut controllers = common_controllers(probe);
        controllers.push(Box::new(controller::MultiplyController::new(
            gate.clone(),
            multiplier,
        )));
        let server = Arc::new(HttpServer::new(
            shutdown_token,
            cfg.node_api_name(),
            controllers,
            middlewares(),
        ));

        Ok(Self {
            instance,
            gate,
            registrar,
            listener,
            server,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.addr
    }

    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    pub fn state(&self) -> RegistrationState {
        self.registrar.state()
    }

    /// Registers the instance, then serves. A registration failure is returned
    /// before anything is served.
    pub async fn serve(&self, gsh: &GracefulShutdown) -> Result<()> {
        let listener = self.listener.take()?;
        let registration = self
            .registrar
            .register(&self.instance)
            .await
            .context("failed to register service instance")?;

        spawn_server(gsh, self.server.clone(), listener, "node");

        // Renewal stops with the process; the key then expires with its lease.
        let token = gsh.token();
        gsh.spawn(async move {
            token.cancelled().await;
            registration.shutdown().await;
        });

        info!(
            component = "app",
            role = "node",
            event = "started",
            instance = %self.instance.id,
            addr = %self.addr(),
            admission_capacity = ?self.gate.capacity(),
            "service instance starting"
        );
        Ok(())
    }
}
