#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::model::{Keyspace, ServiceInstance};
    use crate::registry::{Registrar, RegistrationError, RegistrationState};
    use crate::store::{
        CoordinationStore, KeepAliveStream, KeyValue, Lease, LeaseId, MemoryStore, StoreError,
    };

    const TTL: Duration = Duration::from_secs(10);

    fn keyspace() -> Keyspace {
        Keyspace::new("/services", "multiply-service")
    }

    fn instance() -> ServiceInstance {
        let mut metadata = HashMap::new();
        metadata.insert("version".to_string(), "1.0".to_string());
        ServiceInstance::new("127.0.0.1", 5001, metadata)
    }

    #[derive(Clone, Copy, PartialEq)]
    enum FailAt {
        Grant,
        Put,
        KeepAlive,
    }

    /// Store double failing one step of the registration sequence.
    struct FailingStore {
        inner: MemoryStore,
        fail_at: FailAt,
    }

    #[async_trait::async_trait]
    impl CoordinationStore for FailingStore {
        async fn grant(&self, ttl: Duration) -> Result<Lease, StoreError> {
            if self.fail_at == FailAt::Grant {
                return Err(StoreError::Connection("connection refused".to_string()));
            }
            self.inner.grant(ttl).await
        }

        async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<(), StoreError> {
            if self.fail_at == FailAt::Put {
                return Err(StoreError::Rejected {
                    status: 500,
                    message: "disk full".to_string(),
                });
            }
            self.inner.put(key, value, lease).await
        }

        async fn keepalive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError> {
            if self.fail_at == FailAt::KeepAlive {
                return Err(StoreError::LeaseNotFound(lease));
            }
            self.inner.keepalive(lease).await
        }

        async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, StoreError> {
            self.inner.get_prefix(prefix).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_visible_right_after_register() {
        let store = MemoryStore::new();
        let registrar = Registrar::new(Arc::new(store.clone()), keyspace(), TTL);
        assert_eq!(registrar.state(), RegistrationState::Unregistered);

        let inst = instance();
        let registration = registrar.register(&inst).await.unwrap();
        assert_eq!(registrar.state(), RegistrationState::Registered);
        assert_eq!(registration.key(), format!("/services/multiply-service/{}", inst.id));
        assert_eq!(registration.lease().ttl, TTL);

        let live = store.get_prefix(&keyspace().prefix()).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].key_str(), registration.key());
        assert_eq!(live[0].lease, registration.lease().id);
        assert_eq!(ServiceInstance::decode(&live[0].value).unwrap(), inst);

        registration.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_keeps_key_alive_past_ttl() {
        let store = MemoryStore::new();
        let registrar = Registrar::new(Arc::new(store.clone()), keyspace(), TTL);
        let registration = registrar.register(&instance()).await.unwrap();

        tokio::time::sleep(TTL * 5).await;

        assert_eq!(store.get_prefix(&keyspace().prefix()).await.unwrap().len(), 1);
        assert_eq!(registrar.state(), RegistrationState::Registered);
        assert!(!registration.is_finished());
        registration.shutdown().await;
    }

    /// Stopping renewal leaves the key in place until the lease TTL runs out.
    #[tokio::test(start_paused = true)]
    async fn test_key_disappears_within_ttl_after_renewal_stops() {
        let store = MemoryStore::new();
        let registrar = Registrar::new(Arc::new(store.clone()), keyspace(), TTL);
        let registration = registrar.register(&instance()).await.unwrap();
        let lease = registration.lease().id;

        tokio::time::sleep(Duration::from_secs(25)).await;
        let last = registration.last_renewal();
        registration.shutdown().await;

        // No delete on shutdown.
        assert_eq!(store.get_prefix(&keyspace().prefix()).await.unwrap().len(), 1);

        let deadline = last + TTL;
        tokio::time::sleep_until(deadline).await;
        assert!(store.get_prefix(&keyspace().prefix()).await.unwrap().is_empty());
        assert_eq!(store.time_to_live(lease), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_lease_moves_to_expired() {
        let store = MemoryStore::new();
        let registrar = Registrar::new(Arc::new(store.clone()), keyspace(), TTL);
        let mut state = registrar.subscribe();
        let registration = registrar.register(&instance()).await.unwrap();

        store.revoke(registration.lease().id).unwrap();

        state
            .wait_for(|s| *s == RegistrationState::Expired)
            .await
            .unwrap();
        assert_eq!(registrar.state(), RegistrationState::Expired);

        // Terminal: the task is gone and nothing was re-registered.
        registration.shutdown().await;
        assert!(store.get_prefix(&keyspace().prefix()).await.unwrap().is_empty());
        assert!(matches!(
            registrar.register(&instance()).await,
            Err(RegistrationError::InvalidState(RegistrationState::Expired))
        ));
    }

    #[tokio::test]
    async fn test_grant_failure_is_lease_error() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_at: FailAt::Grant,
        };
        let registrar = Registrar::new(Arc::new(store), keyspace(), TTL);
        let err = registrar.register(&instance()).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Lease(_)));
        assert_eq!(registrar.state(), RegistrationState::Unregistered);
    }

    #[tokio::test]
    async fn test_put_failure_is_registration_error() {
        let inner = MemoryStore::new();
        let store = FailingStore {
            inner: inner.clone(),
            fail_at: FailAt::Put,
        };
        let registrar = Registrar::new(Arc::new(store), keyspace(), TTL);
        let err = registrar.register(&instance()).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Registration(_)));
        assert_eq!(registrar.state(), RegistrationState::Unregistered);
        assert!(inner.get_prefix("/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_setup_failure_is_keepalive_error() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_at: FailAt::KeepAlive,
        };
        let registrar = Registrar::new(Arc::new(store), keyspace(), TTL);
        let err = registrar.register(&instance()).await.unwrap_err();
        assert!(matches!(err, RegistrationError::KeepAlive(_)));
        assert!(err.to_string().starts_with("failed to keep lease alive"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_twice_is_rejected() {
        let registrar = Registrar::new(Arc::new(MemoryStore::new()), keyspace(), TTL);
        let registration = registrar.register(&instance()).await.unwrap();
        assert!(matches!(
            registrar.register(&instance()).await,
            Err(RegistrationError::InvalidState(RegistrationState::Registered))
        ));
        registration.shutdown().await;
    }
}
