//! Downstream request forwarding.

use bytes::Bytes;
use hyper::{Method, StatusCode, Uri};
use tracing::debug;

use crate::http::client::{create_client, empty_body, fetch, ClientError, HyperClient};

/// Downstream answer relayed to the caller as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid downstream target {url}: {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Sends a request to a selected instance.
#[async_trait::async_trait]
pub trait Forwarder: Send + Sync {
    /// Issues `GET url`. Any HTTP status is a successful forward; only
    /// transport failures are errors.
    async fn forward(&self, url: &str) -> Result<Relayed, ForwardError>;
}

/// Forwarder over the pooled hyper client. No timeout: a hung downstream
/// stalls the calling request.
pub struct HttpForwarder {
    client: HyperClient,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self {
            client: create_client(),
        }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, url: &str) -> Result<Relayed, ForwardError> {
        let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            ForwardError::InvalidTarget {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let (status, body) = fetch(&self.client, Method::GET, uri, &[], empty_body()).await?;
        debug!(
            component = "gateway",
            event = "downstream_response",
            url = %url,
            status = status.as_u16(),
            size = body.len(),
            "downstream responded"
        );

        Ok(Relayed { status, body })
    }
}
