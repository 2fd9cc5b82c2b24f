// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::model::keys::DEFAULT_ROOT;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

pub const DEFAULT_SERVICE_NAME: &str = "multiply-service";
pub const DEFAULT_STORE_ENDPOINT: &str = "http://127.0.0.1:2379";
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10);
pub const DEFAULT_ADVERTISE_ADDRESS: &str = "localhost";
pub const DEFAULT_ADMISSION_CAPACITY: usize = 1;
pub const DEFAULT_DELAY_MIN: Duration = Duration::from_secs(6);
pub const DEFAULT_DELAY_MAX: Duration = Duration::from_secs(14);
pub const DEFAULT_NODE_PORT: u16 = 5001;
pub const DEFAULT_GATEWAY_PORT: u16 = 4999;
pub const DEFAULT_STORE_PORT: u16 = 2379;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Mesh {
    #[serde(rename = "mesh")]
    pub mesh: MeshBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub service: Option<Service>,
    pub store: Option<Store>,
    pub node: Option<Node>,
    pub gateway: Option<Gateway>,
    #[serde(rename = "store_server")]
    pub store_server: Option<StoreServer>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

/// Names the registry keyspace: `{prefix}/{name}/{instance id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    pub name: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Store {
    pub endpoint: Option<String>,
    #[serde(rename = "dial_timeout", default, with = "humantime_serde")]
    pub dial_timeout: Option<Duration>,
    #[serde(rename = "lease_ttl", default, with = "humantime_serde")]
    pub lease_ttl: Option<Duration>,
}

/// Listener settings. Port 0 binds an ephemeral port.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Node {
    pub api: Option<Api>,
    #[serde(rename = "advertise_address")]
    pub advertise_address: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub admission: Option<Admission>,
    pub work: Option<Work>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Admission {
    pub enabled: bool,
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Work {
    #[serde(rename = "delay_min", default, with = "humantime_serde")]
    pub delay_min: Option<Duration>,
    #[serde(rename = "delay_max", default, with = "humantime_serde")]
    pub delay_max: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Gateway {
    pub api: Option<Api>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreServer {
    pub api: Option<Api>,
}

pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn service_name(&self) -> &str;
    fn service_prefix(&self) -> &str;
    fn store_endpoint(&self) -> &str;
    fn dial_timeout(&self) -> Duration;
    fn lease_ttl(&self) -> Duration;
    fn node_port(&self) -> u16;
    fn node_api_name(&self) -> &str;
    fn advertise_address(&self) -> &str;
    fn node_metadata(&self) -> HashMap<String, String>;
    fn admission_enabled(&self) -> bool;
    fn admission_capacity(&self) -> usize;
    fn work_delay(&self) -> (Duration, Duration);
    fn gateway_api_name(&self) -> &str;
    fn gateway_port(&self) -> u16;
    fn store_server_api_name(&self) -> &str;
    fn store_server_port(&self) -> u16;
}

// Config type alias for convenience
pub type Config = Mesh;

fn api_port(api: Option<&Api>, default: u16) -> u16 {
    api.and_then(|a| a.port).unwrap_or(default)
}

fn api_name<'a>(api: Option<&'a Api>, default: &'a str) -> &'a str {
    api.and_then(|a| a.name.as_deref()).unwrap_or(default)
}

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.mesh.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.mesh.env == PROD
    }

    fn is_test(&self) -> bool {
        self.mesh.env == TEST
    }

    fn service_name(&self) -> &str {
        self.mesh
            .service
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or(DEFAULT_SERVICE_NAME)
    }

    fn service_prefix(&self) -> &str {
        self.mesh
            .service
            .as_ref()
            .and_then(|s| s.prefix.as_deref())
            .unwrap_or(DEFAULT_ROOT)
    }

    fn store_endpoint(&self) -> &str {
        self.mesh
            .store
            .as_ref()
            .and_then(|s| s.endpoint.as_deref())
            .unwrap_or(DEFAULT_STORE_ENDPOINT)
    }

    fn dial_timeout(&self) -> Duration {
        self.mesh
            .store
            .as_ref()
            .and_then(|s| s.dial_timeout)
            .unwrap_or(DEFAULT_DIAL_TIMEOUT)
    }

    fn lease_ttl(&self) -> Duration {
        self.mesh
            .store
            .as_ref()
            .and_then(|s| s.lease_ttl)
            .unwrap_or(DEFAULT_LEASE_TTL)
    }

    fn node_port(&self) -> u16 {
        api_port(
            self.mesh.node.as_ref().and_then(|n| n.api.as_ref()),
            DEFAULT_NODE_PORT,
        )
    }

    fn node_api_name(&self) -> &str {
        self.mesh
            .node
            .as_ref()
            .and_then(|n| n.api.as_ref())
            .and_then(|a| a.name.as_deref())
            .unwrap_or("leasemesh-node")
    }

    fn advertise_address(&self) -> &str {
        self.mesh
            .node
            .as_ref()
            .and_then(|n| n.advertise_address.as_deref())
            .unwrap_or(DEFAULT_ADVERTISE_ADDRESS)
    }

    fn node_metadata(&self) -> HashMap<String, String> {
        self.mesh
            .node
            .as_ref()
            .and_then(|n| n.metadata.clone())
            .unwrap_or_default()
    }

    fn admission_enabled(&self) -> bool {
        self.mesh
            .node
            .as_ref()
            .and_then(|n| n.admission.as_ref())
            .map(|a| a.enabled)
            .unwrap_or(true)
    }

    fn admission_capacity(&self) -> usize {
        self.mesh
            .node
            .as_ref()
            .and_then(|n| n.admission.as_ref())
            .and_then(|a| a.capacity)
            .unwrap_or(DEFAULT_ADMISSION_CAPACITY)
    }

    fn work_delay(&self) -> (Duration, Duration) {
        let work = self.mesh.node.as_ref().and_then(|n| n.work.as_ref());
        (
            work.and_then(|w| w.delay_min).unwrap_or(DEFAULT_DELAY_MIN),
            work.and_then(|w| w.delay_max).unwrap_or(DEFAULT_DELAY_MAX),
        )
    }

    fn gateway_api_name(&self) -> &str {
        api_name(
            self.mesh.gateway.as_ref().and_then(|g| g.api.as_ref()),
            "leasemesh-gateway",
        )
    }

    fn gateway_port(&self) -> u16 {
        api_port(
            self.mesh.gateway.as_ref().and_then(|g| g.api.as_ref()),
            DEFAULT_GATEWAY_PORT,
        )
    }

    fn store_server_api_name(&self) -> &str {
        api_name(
            self.mesh.store_server.as_ref().and_then(|s| s.api.as_ref()),
            "leasemesh-store",
        )
    }

    fn store_server_port(&self) -> u16 {
        api_port(
            self.mesh.store_server.as_ref().and_then(|s| s.api.as_ref()),
            DEFAULT_STORE_PORT,
        )
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg = Self::parse(&data).with_context(|| format!("config {:?}", abs_path))?;
        Ok(cfg)
    }

    /// Parses and validates a YAML document.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Mesh = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name().is_empty() || self.service_name().contains('/') {
            anyhow::bail!("invalid service.name {:?}", self.service_name());
        }
        if self.lease_ttl() < Duration::from_secs(1) {
            anyhow::bail!("store.lease_ttl must be at least 1s");
        }
        if self.admission_enabled() && self.admission_capacity() == 0 {
            anyhow::bail!("node.admission.capacity must be positive when admission is enabled");
        }
        let (min, max) = self.work_delay();
        if min > max {
            anyhow::bail!("node.work.delay_min ({:?}) exceeds delay_max ({:?})", min, max);
        }
        self.store_endpoint()
            .parse::<hyper::Uri>()
            .with_context(|| format!("invalid store.endpoint {:?}", self.store_endpoint()))?;
        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
