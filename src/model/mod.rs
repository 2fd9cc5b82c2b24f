// Package model provides the service instance record and registry key layout.

pub mod instance;
pub mod keys;


// Re-export main types
pub use instance::ServiceInstance;
pub use keys::Keyspace;
