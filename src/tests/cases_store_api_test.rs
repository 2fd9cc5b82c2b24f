// Integration tests for the store role's etcd v3 JSON gateway API.

use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

use super::support::{assert_equal, post_json, TestMesh};
use crate::store::{wire, CoordinationStore, RemoteStore, StoreError};

fn b64(raw: &str) -> String {
    wire::encode_bytes(raw.as_bytes())
}

#[tokio::test]
async fn test_status_reports_revision() {
    let mesh = TestMesh::start().await;
    let (status, body) = post_json(&mesh.store_url("/v3/maintenance/status"), json!({})).await;
    assert_equal(200, status);
    assert!(body["header"]["revision"].is_string(), "{}", body);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_grant_put_range_with_gateway_encoding() {
    let mesh = TestMesh::start().await;

    let (status, lease) = post_json(&mesh.store_url("/v3/lease/grant"), json!({"TTL": "30"})).await;
    assert_equal(200, status);
    assert_equal(json!("30"), lease["TTL"].clone());
    let id = lease["ID"].as_str().unwrap().to_string();

    for key in ["/services/svc/b", "/services/svc/a", "/services/other/c"] {
        let (status, _) = post_json(
            &mesh.store_url("/v3/kv/put"),
            json!({"key": b64(key), "value": b64("{}"), "lease": id}),
        )
        .await;
        assert_equal(200, status);
    }

    let (status, body) = post_json(
        &mesh.store_url("/v3/kv/range"),
        json!({"key": b64("/services/svc/"), "range_end": b64("/services/svc0")}),
    )
    .await;
    assert_equal(200, status);
    assert_equal(json!("2"), body["count"].clone());
    let kvs = body["kvs"].as_array().unwrap();
    assert_equal(json!(b64("/services/svc/a")), kvs[0]["key"].clone());
    assert_equal(json!(b64("/services/svc/b")), kvs[1]["key"].clone());
    assert_equal(json!(id), kvs[0]["lease"].clone());
}

#[tokio::test]
async fn test_empty_range_omits_kvs() {
    let mesh = TestMesh::start().await;
    let (status, body) = post_json(
        &mesh.store_url("/v3/kv/range"),
        json!({"key": b64("/nothing/"), "range_end": b64("/nothing0")}),
    )
    .await;
    assert_equal(200, status);
    assert!(body.get("kvs").is_none(), "{}", body);
    assert_equal(json!("0"), body["count"].clone());
}

#[tokio::test]
async fn test_unknown_lease_errors() {
    let mesh = TestMesh::start().await;

    let (status, body) = post_json(&mesh.store_url("/v3/lease/revoke"), json!({"ID": "4242"})).await;
    assert_equal(404, status);
    assert_equal(json!(wire::CODE_NOT_FOUND), body["code"].clone());
    assert_equal(json!(wire::ERR_LEASE_NOT_FOUND), body["message"].clone());

    let (status, body) = post_json(
        &mesh.store_url("/v3/kv/put"),
        json!({"key": b64("/k"), "value": b64("v"), "lease": 4242}),
    )
    .await;
    assert_equal(404, status);
    assert_equal(json!(wire::CODE_NOT_FOUND), body["code"].clone());

    // Keepalive on a gone lease answers TTL 0 rather than an error.
    let (status, body) = post_json(&mesh.store_url("/v3/lease/keepalive"), json!({"ID": "4242"})).await;
    assert_equal(200, status);
    assert_equal(json!("0"), body["result"]["TTL"].clone());
}

#[tokio::test]
async fn test_malformed_requests_are_invalid_argument() {
    let mesh = TestMesh::start().await;

    let cases = [
        ("/v3/lease/grant", json!({"TTL": "soon"})),
        ("/v3/lease/grant", json!({"TTL": 0})),
        ("/v3/kv/put", json!({"key": "%%%", "value": ""})),
        ("/v3/kv/put", json!({"value": b64("v")})),
        ("/v3/kv/range", json!({"key": ""})),
    ];
    for (path, body) in cases {
        let (status, answer) = post_json(&mesh.store_url(path), body.clone()).await;
        assert_equal(400, status);
        assert_equal(json!(wire::CODE_INVALID_ARGUMENT), answer["code"].clone());
        assert!(answer["message"].is_string(), "{} {}", path, body);
    }
}

#[tokio::test]
async fn test_too_large_lease_ttl_is_invalid_argument() {
    let mesh = TestMesh::start().await;

    for ttl in [json!("9223372036854775807"), json!("9000000001")] {
        let (status, answer) = post_json(&mesh.store_url("/v3/lease/grant"), json!({"TTL": ttl})).await;
        assert_equal(400, status);
        assert_equal(json!(wire::CODE_INVALID_ARGUMENT), answer["code"].clone());
        assert_equal(json!("etcdserver: too large lease TTL"), answer["message"].clone());
    }

    let (status, lease) = post_json(&mesh.store_url("/v3/lease/grant"), json!({"TTL": "9000000000"})).await;
    assert_equal(200, status);
    assert_equal(json!("9000000000"), lease["TTL"].clone());
}

/// The HTTP client and the store server agree on the whole lease lifecycle.
#[tokio::test]
async fn test_remote_store_lifecycle() {
    let mesh = TestMesh::start().await;
    let store = RemoteStore::connect(&mesh.store_url(""), Duration::from_secs(2))
        .await
        .unwrap();

    let lease = store.grant(Duration::from_secs(5)).await.unwrap();
    assert_equal(Duration::from_secs(5), lease.ttl);
    store
        .put("/services/svc/x", b"payload".to_vec(), lease.id)
        .await
        .unwrap();

    let kvs = store.get_prefix("/services/svc/").await.unwrap();
    assert_equal(1, kvs.len());
    assert_equal("/services/svc/x".to_string(), kvs[0].key_str());
    assert_equal(b"payload".to_vec(), kvs[0].value.clone());
    assert_equal(lease.id, kvs[0].lease);

    let mut acks = store.keepalive(lease.id).await.unwrap();
    let first = acks.next().await.unwrap().unwrap();
    assert_equal(lease.id, first.id);

    store.revoke(lease.id).await.unwrap();
    assert!(store.get_prefix("/services/svc/").await.unwrap().is_empty());
    // The next renewal finds the lease gone and the stream ends.
    assert!(acks.next().await.is_none());

    assert!(matches!(
        store.put("/services/svc/y", Vec::new(), lease.id).await,
        Err(StoreError::LeaseNotFound(_))
    ));
    assert!(matches!(
        store.keepalive(lease.id).await,
        Err(StoreError::LeaseNotFound(_))
    ));
}

#[tokio::test]
async fn test_connect_to_missing_store_fails() {
    // Port 9 (discard) is not served in the test environment.
    let result = RemoteStore::connect("http://127.0.0.1:9", Duration::from_millis(500)).await;
    assert!(matches!(result, Err(StoreError::Connection(_))));
}
