// Integration tests for the discovery gateway: store, nodes and gateway over HTTP.

use std::time::Duration;

use super::support::mesh::{url, with_work_delay};
use super::support::{assert_equal, body_str, get, wait_until, TestMesh};

#[tokio::test]
async fn test_gateway_forwards_to_registered_node() {
    let mesh = TestMesh::start().await;
    let _node = mesh.start_node(mesh.config()).await;
    let gateway = mesh.start_gateway().await;

    let (status, body) = get(&url(gateway.app.addr(), "/multiply/21")).await;
    assert_equal(200, status);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_equal(serde_json::json!({"result": 42}), parsed);
}

#[tokio::test]
async fn test_gateway_without_nodes_is_unavailable() {
    let mesh = TestMesh::start().await;
    let gateway = mesh.start_gateway().await;

    for path in ["/multiply/1", "/multiply/"] {
        let (status, body) = get(&url(gateway.app.addr(), path)).await;
        assert_equal(503, status);
        assert_equal("No services available\n", body_str(&body));
    }
}

#[tokio::test]
async fn test_gateway_forwards_empty_number_to_node() {
    let mesh = TestMesh::start().await;
    let _node = mesh.start_node(mesh.config()).await;
    let gateway = mesh.start_gateway().await;

    let (status, body) = get(&url(gateway.app.addr(), "/multiply/")).await;
    assert_equal(400, status);
    assert_equal("Invalid number\n", body_str(&body));
}

/// Whatever the node answers, including errors, reaches the client unchanged.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gateway_relays_node_errors() {
    let mesh = TestMesh::start().await;
    let mut cfg = mesh.config();
    with_work_delay(&mut cfg, Duration::from_millis(800));
    let node = mesh.start_node(cfg).await;
    let gateway = mesh.start_gateway().await;

    let (status, body) = get(&url(gateway.app.addr(), "/multiply/abc")).await;
    assert_equal(400, status);
    assert_equal("Invalid number\n", body_str(&body));

    let gate = node.app.gate().clone();
    let first = url(gateway.app.addr(), "/multiply/4");
    let r1 = tokio::spawn(async move { get(&first).await });
    assert!(
        wait_until(Duration::from_secs(5), || {
            let gate = gate.clone();
            async move { gate.in_flight() == 1 }
        })
        .await
    );

    let (status, body) = get(&url(gateway.app.addr(), "/multiply/5")).await;
    assert_equal(503, status);
    assert_equal("Service at capacity\n", body_str(&body));

    let (status, body) = r1.await.unwrap();
    assert_equal(200, status);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_equal(serde_json::json!({"result": 8}), parsed);
}

/// A node that stopped renewing disappears from discovery once its lease
/// runs out, without any explicit delete.
#[tokio::test]
async fn test_stopped_node_expires_from_discovery() {
    let mesh = TestMesh::start().await;
    let node = mesh.start_node(mesh.config()).await;
    let gateway = mesh.start_gateway().await;

    let (status, _) = get(&url(gateway.app.addr(), "/multiply/1")).await;
    assert_equal(200, status);

    node.stop().await;

    let gateway_url = url(gateway.app.addr(), "/multiply/1");
    let gateway_url = gateway_url.as_str();
    assert!(
        wait_until(Duration::from_secs(5), || async move {
            get(gateway_url).await.0 == 503
        })
        .await,
        "gateway kept routing to an expired node"
    );
    assert!(gateway.app.gateway().discover().await.unwrap().is_empty());
}

/// With two live nodes the gateway keeps choosing the first by key order.
#[tokio::test]
async fn test_selection_is_stable_across_requests() {
    let mesh = TestMesh::start().await;
    let a = mesh.start_node(mesh.config()).await;
    let b = mesh.start_node(mesh.config()).await;
    let gateway = mesh.start_gateway().await;

    let expected = std::cmp::min(&a.app.instance().id, &b.app.instance().id).clone();
    assert_equal(2, gateway.app.gateway().discover().await.unwrap().len());

    for _ in 0..5 {
        let selected = gateway.app.gateway().select().await.unwrap();
        assert_equal(expected.clone(), selected.id);
        let (status, _) = get(&url(gateway.app.addr(), "/multiply/2")).await;
        assert_equal(200, status);
    }
}

#[tokio::test]
async fn test_gateway_health_and_metrics() {
    let mesh = TestMesh::start().await;
    let gateway = mesh.start_gateway().await;
    let _ = get(&url(gateway.app.addr(), "/multiply/1")).await;

    let (status, _) = get(&url(gateway.app.addr(), "/healthz")).await;
    assert_equal(200, status);

    let (status, body) = get(&url(gateway.app.addr(), "/metrics")).await;
    assert_equal(200, status);
    assert!(body_str(&body).contains("leasemesh_gateway_requests_total"));
}
