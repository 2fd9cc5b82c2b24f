//! etcd v3 JSON gateway endpoints over an in-memory store.
//!
//! Only the subset the node and gateway use is served. Request bodies are
//! decoded by hand so malformed input gets a gateway-style error body instead of
//! axum's plain-text rejection.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http::Controller;
use crate::store::wire::{
    self, GatewayError, LeaseGrantRequest, LeaseGrantResponse, LeaseIdRequest,
    LeaseKeepAliveResponse, LeaseKeepAliveResult, LeaseRevokeResponse, PutRequest, PutResponse,
    RangeRequest, RangeResponse, ResponseHeader, StatusResponse, WireKeyValue,
};
use crate::store::{MemoryStore, StoreError};

/// Failed store call, rendered as `{error, code, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: GatewayError,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: GatewayError::new(wire::CODE_INVALID_ARGUMENT, message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LeaseNotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                body: GatewayError::new(wire::CODE_NOT_FOUND, wire::ERR_LEASE_NOT_FOUND),
            },
            StoreError::Rejected { message, .. } => Self::invalid(message),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: GatewayError::new(wire::CODE_INTERNAL, other.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    // An empty body is an empty message.
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::invalid(format!("malformed request: {}", e)))
}

fn decode(field: &str, encoded: &str) -> Result<Vec<u8>, ApiError> {
    wire::decode_bytes(field, encoded).map_err(|e| ApiError::invalid(e.to_string()))
}

/// StoreApiController exposes a [`MemoryStore`] over the gateway API.
#[derive(Clone)]
pub struct StoreApiController {
    store: MemoryStore,
}

impl StoreApiController {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    fn header(&self) -> ResponseHeader {
        ResponseHeader {
            revision: self.store.revision(),
        }
    }

    fn status(&self, _body: Bytes) -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse {
            header: self.header(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn grant(&self, body: Bytes) -> Result<LeaseGrantResponse, ApiError> {
        let req: LeaseGrantRequest = parse(&body)?;
        if req.ttl <= 0 {
            return Err(ApiError::invalid("lease TTL must be positive"));
        }
        let lease = self
            .store
            .grant_lease(Duration::from_secs(req.ttl as u64), req.id)?;
        debug!(
            component = "store",
            event = "lease_granted",
            lease = lease.id,
            ttl = req.ttl,
            "lease granted"
        );

        Ok(LeaseGrantResponse {
            header: self.header(),
            id: lease.id,
            ttl: req.ttl,
            error: String::new(),
        })
    }

    fn keepalive(&self, body: Bytes) -> Result<LeaseKeepAliveResponse, ApiError> {
        let req: LeaseIdRequest = parse(&body)?;
        // A gone lease is answered with TTL 0, not an error.
        let ttl = match self.store.renew(req.id) {
            Ok(ack) => ack.ttl.as_secs() as i64,
            Err(StoreError::LeaseNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };

        Ok(LeaseKeepAliveResponse {
            result: Some(LeaseKeepAliveResult {
                header: self.header(),
                id: req.id,
                ttl,
            }),
            error: None,
        })
    }

    fn revoke(&self, body: Bytes) -> Result<LeaseRevokeResponse, ApiError> {
        let req: LeaseIdRequest = parse(&body)?;
        self.store.revoke(req.id)?;
        Ok(LeaseRevokeResponse {
            header: self.header(),
        })
    }

    fn put(&self, body: Bytes) -> Result<PutResponse, ApiError> {
        let req: PutRequest = parse(&body)?;
        let key = decode("key", &req.key)?;
        let value = decode("value", &req.value)?;
        let revision = self.store.put_entry(key, value, req.lease)?;
        Ok(PutResponse {
            header: ResponseHeader { revision },
        })
    }

    fn range(&self, body: Bytes) -> Result<RangeResponse, ApiError> {
        let req: RangeRequest = parse(&body)?;
        let key = decode("key", &req.key)?;
        let range_end = decode("range_end", &req.range_end)?;
        if key.is_empty() {
            return Err(ApiError::invalid("key is not provided"));
        }

        let (entries, revision) = self.store.range(&key, &range_end);
        let kvs: Vec<WireKeyValue> = entries
            .into_iter()
            .map(|e| WireKeyValue {
                key: wire::encode_bytes(&e.kv.key),
                value: wire::encode_bytes(&e.kv.value),
                create_revision: e.create_revision,
                mod_revision: e.mod_revision,
                version: e.version,
                lease: e.kv.lease,
            })
            .collect();

        Ok(RangeResponse {
            header: ResponseHeader { revision },
            count: kvs.len() as i64,
            kvs,
        })
    }
}

/// Wraps a store call into a JSON response.
fn respond<T: serde::Serialize>(path: &'static str, result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            warn!(
                component = "store",
                event = "request_failed",
                path = path,
                status = e.status.as_u16(),
                message = %e.body.message,
                "store request failed"
            );
            e.into_response()
        }
    }
}

macro_rules! store_route {
    ($router:expr, $controller:expr, $path:expr, $method:ident) => {{
        let controller = $controller.clone();
        $router.route(
            $path,
            post(move |body: Bytes| {
                let controller = controller.clone();
                async move { respond($path, controller.$method(body)) }
            }),
        )
    }};
}

impl Controller for StoreApiController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        let router = store_route!(router, controller, wire::STATUS_PATH, status);
        let router = store_route!(router, controller, wire::LEASE_GRANT_PATH, grant);
        let router = store_route!(router, controller, wire::LEASE_KEEPALIVE_PATH, keepalive);
        let router = store_route!(router, controller, wire::LEASE_REVOKE_PATH, revoke);
        let router = store_route!(router, controller, wire::KV_PUT_PATH, put);
        store_route!(router, controller, wire::KV_RANGE_PATH, range)
    }
}
