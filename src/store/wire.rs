//! etcd v3 JSON gateway message shapes (the subset used here).
//!
//! Byte fields travel as base64 strings. int64 fields are written as decimal
//! strings, the way the gateway emits them, and accepted as strings or numbers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use super::StoreError;

pub const STATUS_PATH: &str = "/v3/maintenance/status";
pub const LEASE_GRANT_PATH: &str = "/v3/lease/grant";
pub const LEASE_KEEPALIVE_PATH: &str = "/v3/lease/keepalive";
pub const LEASE_REVOKE_PATH: &str = "/v3/lease/revoke";
pub const KV_PUT_PATH: &str = "/v3/kv/put";
pub const KV_RANGE_PATH: &str = "/v3/kv/range";

/// gRPC status codes carried in gateway error bodies.
pub const CODE_INVALID_ARGUMENT: i32 = 3;
pub const CODE_NOT_FOUND: i32 = 5;
pub const CODE_INTERNAL: i32 = 13;

pub const ERR_LEASE_NOT_FOUND: &str = "etcdserver: requested lease not found";

pub fn encode_bytes(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

pub fn decode_bytes(field: &str, encoded: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| StoreError::Decode(format!("field {} is not base64: {}", field, e)))
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub revision: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub header: ResponseHeader,
    #[serde(default)]
    pub version: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseGrantRequest {
    #[serde(rename = "TTL")]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub ttl: i64,
    #[serde(rename = "ID", default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub id: i64,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseGrantResponse {
    #[serde(default)]
    pub header: ResponseHeader,
    #[serde(rename = "ID", default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub id: i64,
    #[serde(rename = "TTL", default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub ttl: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseIdRequest {
    #[serde(rename = "ID")]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub id: i64,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseKeepAliveResult {
    #[serde(default)]
    pub header: ResponseHeader,
    #[serde(rename = "ID", default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub id: i64,
    /// Remaining TTL in seconds; 0 once the lease is gone.
    #[serde(rename = "TTL", default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub ttl: i64,
}

/// Keepalive is a server stream in gRPC; the gateway wraps each message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseKeepAliveResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LeaseKeepAliveResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GatewayError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseRevokeResponse {
    #[serde(default)]
    pub header: ResponseHeader,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub lease: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutResponse {
    #[serde(default)]
    pub header: ResponseHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub range_end: String,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireKeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub create_revision: i64,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub mod_revision: i64,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub version: i64,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub lease: i64,
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeResponse {
    #[serde(default)]
    pub header: ResponseHeader,
    /// Omitted by the gateway when the range is empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kvs: Vec<WireKeyValue>,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub count: i64,
}

/// Error body written by the gateway for failed calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl GatewayError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: message.clone(),
            code,
            message,
        }
    }

    pub fn is_lease_not_found(&self) -> bool {
        self.code == CODE_NOT_FOUND && self.message.contains("lease not found")
    }
}
