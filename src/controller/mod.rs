// HTTP API controllers of the three roles.

pub mod controller;
pub mod gateway;
pub mod metrics;
pub mod multiply;
pub mod probe;
pub mod store;

// Re-export controller types for convenience
pub use gateway::GatewayController;
pub use metrics::PrometheusMetricsController;
pub use multiply::MultiplyController;
pub use probe::LivenessProbeController;
pub use store::StoreApiController;
