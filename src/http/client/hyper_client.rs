//! Hyper HTTP client configuration for store calls and downstream forwarding.
//!
//! Pool settings:
//! - Max idle connections per host: 256
//! - Max idle connection duration: 30s
//! - Connection timeout: 3s
//! - TCP keep-alive: 30s
//! - TCP_NODELAY: enabled
//!
//! No request timeout is applied here: callers that need one wrap the call.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Connection pool configuration constants.
pub const CONNS_PER_HOST: usize = 256;
pub const MAX_IDLE_CONN_DURATION: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub type HyperClient = Client<HttpConnector, BoxBody<Bytes, hyper::Error>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    Build(#[from] hyper::http::Error),
    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),
}

/// Creates a pooled HTTP/1.1 client.
pub fn create_client() -> HyperClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_nodelay(true);
    http_connector.set_keepalive(Some(Duration::from_secs(30)));
    http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(MAX_IDLE_CONN_DURATION)
        .pool_max_idle_per_host(CONNS_PER_HOST)
        .build(http_connector)
}

pub fn empty_body() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new()
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed()
}

pub fn full_body(bytes: impl Into<Bytes>) -> BoxBody<Bytes, hyper::Error> {
    Full::new(bytes.into())
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed()
}

/// Sends one request and collects the whole response body.
pub async fn fetch(
    client: &HyperClient,
    method: Method,
    uri: Uri,
    headers: &[(&str, &str)],
    body: BoxBody<Bytes, hyper::Error>,
) -> Result<(StatusCode, Bytes), ClientError> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(body)?;

    let response = client.request(req).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    Ok((status, body))
}
