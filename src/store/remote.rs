//! Coordination store client speaking the etcd v3 JSON gateway API.

use futures::StreamExt;
use hyper::{Method, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use super::wire::{
    self, GatewayError, LeaseGrantRequest, LeaseGrantResponse, LeaseIdRequest,
    LeaseKeepAliveResponse, LeaseRevokeResponse, PutRequest, PutResponse, RangeRequest,
    RangeResponse, StatusRequest, StatusResponse,
};
use super::{
    keepalive_interval, prefix_range_end, CoordinationStore, KeepAliveAck, KeepAliveStream,
    KeyValue, Lease, LeaseId, Renewal, StoreError,
};
use crate::http::client::{create_client, fetch, full_body, ClientError, HyperClient};

/// [`CoordinationStore`] backed by a remote etcd-compatible JSON gateway.
#[derive(Clone)]
pub struct RemoteStore {
    endpoint: Arc<str>,
    client: HyperClient,
}

impl RemoteStore {
    /// Creates a client without contacting the store.
    pub fn new(endpoint: &str) -> Result<Self, StoreError> {
        let endpoint = endpoint.trim_end_matches('/');
        endpoint
            .parse::<Uri>()
            .map_err(|e| StoreError::Connection(format!("invalid endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            endpoint: Arc::from(endpoint),
            client: create_client(),
        })
    }

    /// Creates a client and checks the store answers within `dial_timeout`.
    pub async fn connect(endpoint: &str, dial_timeout: Duration) -> Result<Self, StoreError> {
        let store = Self::new(endpoint)?;

        let status = match timeout(dial_timeout, store.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(StoreError::Connection(format!(
                    "failed to connect to {}: {}",
                    store.endpoint, e
                )))
            }
            Err(_) => {
                return Err(StoreError::Connection(format!(
                    "no answer from {} within {:?}",
                    store.endpoint, dial_timeout
                )))
            }
        };

        info!(
            component = "store",
            event = "connected",
            endpoint = %store.endpoint,
            version = %status.version,
            revision = status.header.revision,
            "connected to coordination store"
        );

        Ok(store)
    }

    /// Store status, used as the connectivity probe.
    pub async fn status(&self) -> Result<StatusResponse, StoreError> {
        self.call(wire::STATUS_PATH, &StatusRequest {}, 0).await
    }

    /// Revokes a lease, deleting its keys.
    pub async fn revoke(&self, lease: LeaseId) -> Result<(), StoreError> {
        let _: LeaseRevokeResponse = self
            .call(wire::LEASE_REVOKE_PATH, &LeaseIdRequest { id: lease }, lease)
            .await?;
        Ok(())
    }

    /// Sends one keepalive. `None` means the lease is gone.
    async fn keepalive_once(&self, lease: LeaseId) -> Result<Option<KeepAliveAck>, StoreError> {
        let resp: LeaseKeepAliveResponse = self
            .call(wire::LEASE_KEEPALIVE_PATH, &LeaseIdRequest { id: lease }, lease)
            .await?;

        if let Some(err) = resp.error {
            return Err(map_gateway_error(200, err, lease));
        }

        match resp.result {
            Some(result) if result.ttl > 0 => Ok(Some(KeepAliveAck {
                id: lease,
                ttl: Duration::from_secs(result.ttl as u64),
            })),
            _ => Ok(None),
        }
    }

    async fn call<Req, Resp>(&self, path: &str, req: &Req, lease: LeaseId) -> Result<Resp, StoreError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        let uri: Uri = url
            .parse()
            .map_err(|e| StoreError::Connection(format!("invalid URL {}: {}", url, e)))?;
        let payload = serde_json::to_vec(req)
            .map_err(|e| StoreError::Decode(format!("failed to encode request: {}", e)))?;

        let (status, body) = fetch(
            &self.client,
            Method::POST,
            uri,
            &[("content-type", "application/json")],
            full_body(payload),
        )
        .await
        .map_err(|e| match e {
            ClientError::Build(e) => StoreError::Connection(format!("invalid request: {}", e)),
            other => StoreError::Connection(other.to_string()),
        })?;

        if !status.is_success() {
            let err = serde_json::from_slice::<GatewayError>(&body).unwrap_or_else(|_| {
                GatewayError::new(
                    wire::CODE_INTERNAL,
                    String::from_utf8_lossy(&body).trim().to_string(),
                )
            });
            return Err(map_gateway_error(status.as_u16(), err, lease));
        }

        decode_message(&body)
    }
}

/// Decodes the first JSON message of a body. Streaming gateway calls write
/// newline-delimited messages.
fn decode_message<T: DeserializeOwned>(body: &[u8]) -> Result<T, StoreError> {
    let first = body
        .split(|b| *b == b'\n')
        .find(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .unwrap_or(b"{}");
    serde_json::from_slice(first).map_err(|e| StoreError::Decode(e.to_string()))
}

fn map_gateway_error(status: u16, err: GatewayError, lease: LeaseId) -> StoreError {
    if err.is_lease_not_found() {
        return StoreError::LeaseNotFound(lease);
    }
    let message = if err.message.is_empty() { err.error } else { err.message };
    StoreError::Rejected { status, message }
}

/// TTL in whole seconds, rounded up.
fn ttl_secs(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[async_trait::async_trait]
impl CoordinationStore for RemoteStore {
    async fn grant(&self, ttl: Duration) -> Result<Lease, StoreError> {
        let req = LeaseGrantRequest {
            ttl: ttl_secs(ttl),
            id: 0,
        };
        let resp: LeaseGrantResponse = self.call(wire::LEASE_GRANT_PATH, &req, 0).await?;
        if !resp.error.is_empty() {
            return Err(StoreError::Rejected {
                status: 200,
                message: resp.error,
            });
        }
        if resp.id == 0 || resp.ttl <= 0 {
            return Err(StoreError::Decode(format!(
                "grant returned lease {} with TTL {}",
                resp.id, resp.ttl
            )));
        }

        Ok(Lease {
            id: resp.id,
            ttl: Duration::from_secs(resp.ttl as u64),
        })
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<(), StoreError> {
        let req = PutRequest {
            key: wire::encode_bytes(key.as_bytes()),
            value: wire::encode_bytes(&value),
            lease,
        };
        let _: PutResponse = self.call(wire::KV_PUT_PATH, &req, lease).await?;
        Ok(())
    }

    async fn keepalive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError> {
        let first = self
            .keepalive_once(lease)
            .await?
            .ok_or(StoreError::LeaseNotFound(lease))?;
        let interval = keepalive_interval(first.ttl);
        let store = self.clone();

        let stream = futures::stream::unfold(Renewal::First(first), move |step| {
            let store = store.clone();
            async move {
                match step {
                    Renewal::Done => None,
                    Renewal::First(ack) => Some((Ok(ack), Renewal::Next)),
                    Renewal::Next => {
                        tokio::time::sleep(interval).await;
                        match store.keepalive_once(lease).await {
                            Ok(Some(ack)) => Some((Ok(ack), Renewal::Next)),
                            Ok(None) => {
                                debug!(
                                    component = "store",
                                    event = "keepalive_ttl_zero",
                                    lease = lease,
                                    "lease is gone"
                                );
                                None
                            }
                            Err(e) => Some((Err(e), Renewal::Done)),
                        }
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, StoreError> {
        let req = RangeRequest {
            key: wire::encode_bytes(prefix.as_bytes()),
            range_end: wire::encode_bytes(&prefix_range_end(prefix.as_bytes())),
        };
        let resp: RangeResponse = self.call(wire::KV_RANGE_PATH, &req, 0).await?;

        resp.kvs
            .into_iter()
            .map(|kv| {
                Ok(KeyValue {
                    key: wire::decode_bytes("key", &kv.key)?,
                    value: wire::decode_bytes("value", &kv.value)?,
                    lease: kv.lease,
                })
            })
            .collect()
    }
}
