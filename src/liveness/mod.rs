// Package liveness aggregates the health of the running components.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;


/// Service interface for liveness checking
pub trait Service: Send + Sync {
    /// Name reported when the service is not alive.
    fn name(&self) -> &str;

    /// Checks if the service is alive
    fn is_alive(&self) -> bool;
}

/// Liveness probe over a set of watched services.
///
/// A probe watching nothing is alive.
#[derive(Default)]
pub struct Probe {
    services: RwLock<Vec<Arc<dyn Service>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds services to the watched set.
    pub fn watch(&self, services: Vec<Arc<dyn Service>>) {
        self.services.write().extend(services);
    }

    /// Alive iff every watched service is alive.
    pub fn is_alive(&self) -> bool {
        let services = self.services.read();
        for service in services.iter() {
            if !service.is_alive() {
                warn!(
                    component = "liveness",
                    event = "service_not_alive",
                    service = service.name(),
                    "liveness check failed"
                );
                return false;
            }
        }
        true
    }
}
