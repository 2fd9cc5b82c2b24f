use super::{Admission, Api, Config, Logs, MeshBox, Node, Service, Store, Work};
use std::collections::HashMap;
use std::time::Duration;

/// Creates a new test configuration: ephemeral ports, a short lease and no
/// simulated work delay.
pub fn new_test_config() -> Config {
    Config {
        mesh: MeshBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            service: Some(Service {
                name: Some(super::DEFAULT_SERVICE_NAME.to_string()),
                prefix: Some("/services".to_string()),
            }),
            store: Some(Store {
                endpoint: Some(super::DEFAULT_STORE_ENDPOINT.to_string()),
                dial_timeout: Some(Duration::from_secs(2)),
                lease_ttl: Some(Duration::from_secs(3)),
            }),
            node: Some(Node {
                api: Some(Api {
                    name: Some("leasemesh-node".to_string()),
                    port: Some(0),
                }),
                advertise_address: Some("127.0.0.1".to_string()),
                metadata: Some(HashMap::from([("zone".to_string(), "test".to_string())])),
                admission: Some(Admission {
                    enabled: true,
                    capacity: Some(1),
                }),
                work: Some(Work {
                    delay_min: Some(Duration::ZERO),
                    delay_max: Some(Duration::ZERO),
                }),
            }),
            gateway: Some(super::Gateway {
                api: Some(Api {
                    name: Some("leasemesh-gateway".to_string()),
                    port: Some(0),
                }),
            }),
            store_server: Some(super::StoreServer {
                api: Some(Api {
                    name: Some("leasemesh-store".to_string()),
                    port: Some(0),
                }),
            }),
        },
    }
}
