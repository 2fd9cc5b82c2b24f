//! HTTP server implementation.
//

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::controller::controller::Controller;
use crate::middleware::middleware::Middleware;

/// HTTP server composed from controllers and middlewares.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    name: String,
    router: Router,
}

impl HttpServer {
    /// Creates a new HTTP server.
    pub fn new(
        shutdown_token: CancellationToken,
        name: impl Into<String>,
        controllers: Vec<Box<dyn Controller>>,
        middlewares: Vec<Box<dyn Middleware>>,
    ) -> Self {
        let router = Self::build_router(controllers);
        let router = Self::merge_middlewares(router, middlewares);

        Self {
            shutdown_token,
            name: name.into(),
            router,
        }
    }

    /// Binds `0.0.0.0:port`; port 0 picks an ephemeral port.
    pub async fn bind(port: u16) -> Result<TcpListener> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind TCP listener on {}", addr))
    }

    /// Serves on an already bound listener until the shutdown token fires.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener
            .local_addr()
            .context("Failed to read listener address")?;
        let name = self.name.as_str();

        info!(
            component = "server",
            event = "started",
            name = name,
            addr = %addr,
            "server started"
        );

        let shutdown_token = self.shutdown_token.clone();
        let serve_future =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "serve_failed",
                name = name,
                addr = %addr,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = name,
            addr = %addr,
            "server stopped"
        );

        Ok(())
    }

    /// Builds the router with all controllers.
    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();

        for controller in controllers {
            router = controller.add_route(router);
        }

        router
    }

    /// Merges middlewares into the router.
    fn merge_middlewares(router: Router, middlewares: Vec<Box<dyn Middleware>>) -> Router {
        let mut result = router;

        // Apply middlewares in reverse order (first middleware ends up outermost)
        for middleware in middlewares.iter().rev() {
            result = middleware.apply(result);
        }

        result
    }
}
