// Main entrypoint for the leasemesh binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use leasemesh::app::{GatewayApp, NodeApp, StoreApp};
use leasemesh::config::{Config, ConfigTrait};
use leasemesh::controller::metrics::init_prometheus_exporter;
use leasemesh::shutdown::GracefulShutdown;
use leasemesh::store::{CoordinationStore, RemoteStore};

const CONFIG_PATH: &str = "cfg/leasemesh.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/leasemesh.cfg.local.yaml";

/// leasemesh - self-registering compute nodes behind a discovery gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    cfg: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Role {
    /// Compute node: registers itself and serves /multiply/{n}
    Node,
    /// Discovery gateway: forwards /multiply/{n} to a live node
    Gateway,
    /// Development coordination store (etcd v3 JSON gateway subset)
    Store,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(
            component = "config",
            event = "load_success",
            path = ?custom_path,
            "config loaded"
        );
        return Ok(cfg);
    }

    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => {
            info!(
                component = "config",
                event = "load_success",
                path = CONFIG_PATH_LOCAL,
                "config loaded"
            );
            Ok(cfg)
        }
        Err(_) => {
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(
                component = "config",
                event = "load_success",
                path = CONFIG_PATH,
                "config loaded"
            );
            Ok(cfg)
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

/// Connects to the coordination store; failing to reach it is fatal.
async fn connect_store(cfg: &Config) -> Result<Arc<dyn CoordinationStore>> {
    let store = RemoteStore::connect(cfg.store_endpoint(), cfg.dial_timeout())
        .await
        .context("failed to connect to coordination store")?;
    let store: Arc<dyn CoordinationStore> = Arc::new(store);
    Ok(store)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = init_prometheus_exporter() {
        eprintln!("Warning: {}; metrics endpoint will not be available", e);
    }

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let cfg = load_cfg(args.cfg)?;
    configure_logger(&cfg);

    let mut graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown.set_graceful_timeout(Duration::from_secs(30));

    if let Err(e) = start(args.role, &cfg, shutdown_token.clone(), &graceful_shutdown).await {
        error!(
            component = "main",
            scope = "app",
            event = "start_failed",
            role = ?args.role,
            error = ?e,
            "failed to start app"
        );
        shutdown_token.cancel();
        return Err(e);
    }

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}

async fn start(
    role: Role,
    cfg: &Config,
    shutdown_token: CancellationToken,
    gsh: &GracefulShutdown,
) -> Result<()> {
    match role {
        Role::Node => {
            let store = connect_store(cfg).await?;
            let app = NodeApp::new(shutdown_token, cfg, store).await?;
            app.serve(gsh).await
        }
        Role::Gateway => {
            let store = connect_store(cfg).await?;
            let app = GatewayApp::new(shutdown_token, cfg, store).await?;
            app.serve(gsh).await
        }
        Role::Store => {
            let app = StoreApp::new(shutdown_token, cfg).await?;
            app.serve(gsh).await
        }
    }
}
