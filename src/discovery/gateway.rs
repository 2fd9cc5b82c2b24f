//! Discovery-and-forward path of the gateway.
//!
//! Per request: list live instances under the service prefix, take the first
//! one in store order, forward the request path to it and hand back whatever it
//! answered. An empty listing is the only signal that instances are gone.
//! Nothing is retried and nothing fails over.

use hyper::StatusCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{ForwardError, Forwarder, Relayed};
use crate::metrics;
use crate::model::{Keyspace, ServiceInstance};
use crate::store::{CoordinationStore, KeyValue, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("failed to get services: {0}")]
    DiscoveryQuery(#[source] StoreError),
    #[error("no services available")]
    NoInstances,
    #[error("failed to parse service data: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("failed to forward request: {0}")]
    Forward(#[source] ForwardError),
}

impl RouteError {
    /// Status answered to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NoInstances => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body answered to the caller; internal details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            RouteError::DiscoveryQuery(_) => "Failed to get services",
            RouteError::NoInstances => "No services available",
            RouteError::Deserialization(_) => "Failed to parse service data",
            RouteError::Forward(_) => "Failed to forward request",
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            RouteError::NoInstances => "unavailable",
            _ => "error",
        }
    }
}

pub struct Gateway {
    store: Arc<dyn CoordinationStore>,
    keyspace: Keyspace,
    forwarder: Arc<dyn Forwarder>,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        keyspace: Keyspace,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            store,
            keyspace,
            forwarder,
        }
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Lists the live registry entries of the service.
    pub async fn discover(&self) -> Result<Vec<KeyValue>, RouteError> {
        self.store
            .get_prefix(&self.keyspace.prefix())
            .await
            .map_err(RouteError::DiscoveryQuery)
    }

    /// Picks the instance to forward to: the first entry in store order.
    pub async fn select(&self) -> Result<ServiceInstance, RouteError> {
        let entries = self.discover().await?;
        let first = entries.first().ok_or(RouteError::NoInstances)?;
        ServiceInstance::decode(&first.value).map_err(RouteError::Deserialization)
    }

    /// Forwards a request path to a live instance and returns its answer.
    pub async fn route(&self, path: &str) -> Result<Relayed, RouteError> {
        let result = self.try_route(path).await;
        match &result {
            Ok(_) => metrics::gateway_request("forwarded"),
            Err(e) => {
                metrics::gateway_request(e.outcome());
                match e {
                    RouteError::NoInstances => warn!(
                        component = "gateway",
                        event = "no_instances",
                        service = self.keyspace.service(),
                        path = %path,
                        "no services available"
                    ),
                    other => error!(
                        component = "gateway",
                        event = "route_failed",
                        service = self.keyspace.service(),
                        path = %path,
                        error = %other,
                        "request routing failed"
                    ),
                }
            }
        }
        result
    }

    async fn try_route(&self, path: &str) -> Result<Relayed, RouteError> {
        let instance = self.select().await?;
        let target = instance.target_url(path);

        info!(
            component = "gateway",
            event = "forwarding",
            instance = %instance.id,
            target = %target,
            "forwarding request"
        );

        self.forwarder
            .forward(&target)
            .await
            .map_err(RouteError::Forward)
    }
}
