// Package app wires the three roles: compute node, discovery gateway and
// development coordination store.

pub mod gateway;
pub mod node;
pub mod store;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::error;

use crate::controller;
use crate::http::{Controller, HttpServer, Middleware};
use crate::liveness;
use crate::middleware::{PanicRecoverMiddleware, TraceMiddleware};
use crate::shutdown::GracefulShutdown;

pub use gateway::GatewayApp;
pub use node::NodeApp;
pub use store::StoreApp;

/// Controllers every role serves next to its own.
fn common_controllers(probe: Arc<liveness::Probe>) -> Vec<Box<dyn Controller>> {
    vec![
        // Healthcheck probe endpoint
        Box::new(controller::LivenessProbeController::new(probe)),
        // Metrics endpoint
        Box::new(controller::PrometheusMetricsController::new()),
    ]
}

/// Returns all HTTP middlewares; the first one is outermost.
fn middlewares() -> Vec<Box<dyn Middleware>> {
    vec![
        Box::new(TraceMiddleware::new()),
        Box::new(PanicRecoverMiddleware::new()),
    ]
}

/// A bound listener waiting to be served.
struct Listener {
    addr: SocketAddr,
    inner: Mutex<Option<TcpListener>>,
}

impl Listener {
    async fn bind(port: u16) -> Result<Self> {
        let listener = HttpServer::bind(port).await?;
        let addr = listener
            .local_addr()
            .context("Failed to read listener address")?;
        Ok(Self {
            addr,
            inner: Mutex::new(Some(listener)),
        })
    }

    fn take(&self) -> Result<TcpListener> {
        self.inner
            .lock()
            .take()
            .context("server is already serving")
    }
}

/// Serves on `listener` as a tracked task; the task cancels the shutdown token
/// when the server stops, so a failed server brings the process down.
fn spawn_server(
    gsh: &GracefulShutdown,
    server: Arc<HttpServer>,
    listener: TcpListener,
    role: &'static str,
) {
    let token = gsh.token();
    gsh.spawn(async move {
        if let Err(e) = server.serve(listener).await {
            error!(
                component = "app",
                scope = "server",
                role = role,
                event = "serve_failed",
                error = %e,
                "server failed to serve"
            );
        }
        token.cancel();
    });
}
