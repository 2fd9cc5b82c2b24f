// Package model provides the instance identity stored in the coordination store.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Identity of one running node as advertised in the registry.
///
/// The JSON encoding is the stored value schema:
/// `{"id": string, "address": string, "port": integer, "metadata": {string: string}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Creates an instance with a fresh random identifier.
    pub fn new(address: impl Into<String>, port: u16, metadata: HashMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address: address.into(),
            port,
            metadata,
        }
    }

    /// Encodes the record as the registry value.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a registry value.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Builds the downstream URL for a request path on this instance.
    pub fn target_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{}:{}{}", self.address, self.port, path)
        } else {
            format!("http://{}:{}/{}", self.address, self.port, path)
        }
    }
}

// Nodes that never set metadata may store `"metadata": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<HashMap<String, String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
