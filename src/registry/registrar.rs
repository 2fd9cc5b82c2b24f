//! Lease-bound registration with a supervised renewal task.
//!
//! Lifecycle: `Unregistered -> Registered -> Expired`. The record is written
//! under a lease and kept alive by a background task consuming the store's
//! keepalive stream. When the stream ends the lease is considered lost and the
//! state becomes `Expired` for good; nothing re-registers.
//!
//! There is no explicit deregistration: stopping the task only stops renewing,
//! and the store drops the key once the lease TTL runs out.

use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::model::{Keyspace, ServiceInstance};
use crate::store::{CoordinationStore, KeepAliveStream, Lease, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registered,
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("failed to marshal instance data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to create lease: {0}")]
    Lease(#[source] StoreError),
    #[error("failed to register service: {0}")]
    Registration(#[source] StoreError),
    #[error("failed to keep lease alive: {0}")]
    KeepAlive(#[source] StoreError),
    #[error("instance is already {0:?}")]
    InvalidState(RegistrationState),
}

/// Registers one instance under a service key space.
pub struct Registrar {
    store: Arc<dyn CoordinationStore>,
    keyspace: Keyspace,
    ttl: Duration,
    state: Arc<watch::Sender<RegistrationState>>,
}

impl Registrar {
    pub fn new(store: Arc<dyn CoordinationStore>, keyspace: Keyspace, ttl: Duration) -> Self {
        let (state, _) = watch::channel(RegistrationState::Unregistered);
        Self {
            store,
            keyspace,
            ttl,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Writes the instance record under a fresh lease and starts renewing it.
    pub async fn register(&self, instance: &ServiceInstance) -> Result<Registration, RegistrationError> {
        let current = self.state();
        if current != RegistrationState::Unregistered {
            return Err(RegistrationError::InvalidState(current));
        }

        let record = instance.encode()?;

        let lease = self
            .store
            .grant(self.ttl)
            .await
            .map_err(RegistrationError::Lease)?;

        let key = self.keyspace.key(&instance.id);
        self.store
            .put(&key, record, lease.id)
            .await
            .map_err(RegistrationError::Registration)?;
        self.state.send_replace(RegistrationState::Registered);

        let acks = match self.store.keepalive(lease.id).await {
            Ok(acks) => acks,
            Err(e) => {
                // The key stays until the lease runs out on its own.
                self.state.send_replace(RegistrationState::Expired);
                return Err(RegistrationError::KeepAlive(e));
            }
        };

        info!(
            component = "registry",
            event = "registered",
            service = self.keyspace.service(),
            instance = %instance.id,
            key = %key,
            lease = lease.id,
            ttl = ?lease.ttl,
            "service instance registered"
        );

        let shutdown = CancellationToken::new();
        let last_renewal = Arc::new(Mutex::new(Instant::now()));
        let handle = tokio::task::spawn(renew(
            acks,
            self.state.clone(),
            shutdown.clone(),
            last_renewal.clone(),
            instance.id.clone(),
        ));

        Ok(Registration {
            key,
            lease,
            shutdown,
            last_renewal,
            handle,
        })
    }
}

/// Handle on a live registration and its renewal task.
#[derive(Debug)]
pub struct Registration {
    key: String,
    lease: Lease,
    shutdown: CancellationToken,
    last_renewal: Arc<Mutex<Instant>>,
    handle: JoinHandle<()>,
}

impl Registration {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lease(&self) -> Lease {
        self.lease
    }

    /// Time of the last acknowledged renewal.
    pub fn last_renewal(&self) -> Instant {
        *self.last_renewal.lock()
    }

    /// Whether the renewal task has ended (lease lost or stopped).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops renewing and waits for the renewal task to exit.
    ///
    /// The key is not deleted; it disappears when the lease expires.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!(
                component = "registry",
                event = "renewal_join_failed",
                error = %e,
                "renewal task did not exit cleanly"
            );
        }
    }
}

async fn renew(
    mut acks: KeepAliveStream,
    state: Arc<watch::Sender<RegistrationState>>,
    shutdown: CancellationToken,
    last_renewal: Arc<Mutex<Instant>>,
    instance_id: String,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(
                    component = "registry",
                    event = "renewal_stopped",
                    instance = %instance_id,
                    "lease renewal stopped, key expires with the lease"
                );
                return;
            }
            ack = acks.next() => match ack {
                Some(Ok(ack)) => {
                    *last_renewal.lock() = Instant::now();
                    metrics::lease_renewed();
                    debug!(
                        component = "registry",
                        event = "lease_renewed",
                        instance = %instance_id,
                        lease = ack.id,
                        ttl = ?ack.ttl,
                        "lease renewed"
                    );
                }
                Some(Err(e)) => {
                    error!(
                        component = "registry",
                        event = "lease_lost",
                        instance = %instance_id,
                        error = %e,
                        "lost lease keep-alive"
                    );
                    break;
                }
                None => {
                    warn!(
                        component = "registry",
                        event = "lease_lost",
                        instance = %instance_id,
                        "lost lease keep-alive"
                    );
                    break;
                }
            }
        }
    }

    metrics::lease_lost();
    state.send_replace(RegistrationState::Expired);
}
