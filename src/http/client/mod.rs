//! Outbound HTTP client shared by the store client and the gateway forwarder.

mod hyper_client;

pub use hyper_client::{create_client, empty_body, fetch, full_body, ClientError, HyperClient};
