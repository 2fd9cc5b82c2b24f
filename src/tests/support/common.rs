// Common test utilities for integration tests.

use std::future::Future;
use std::time::Duration;

/// Makes an HTTP request and returns status and body.
pub async fn do_request(
    method: &str,
    url: &str,
    body: Option<&[u8]>,
) -> Result<(u16, Vec<u8>), reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let mut request = match method {
        "GET" => client.get(url),
        "POST" => client.post(url),
        _ => panic!("unsupported method: {}", method),
    };

    if let Some(body_data) = body {
        request = request
            .header("content-type", "application/json")
            .body(body_data.to_vec());
    }

    let resp = request.send().await?;
    let status = resp.status().as_u16();
    let body = resp.bytes().await?.to_vec();
    Ok((status, body))
}

pub async fn get(url: &str) -> (u16, Vec<u8>) {
    assert_ok(do_request("GET", url, None).await)
}

/// POSTs a JSON document and parses the JSON answer.
pub async fn post_json(url: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
    let raw = serde_json::to_vec(&body).unwrap();
    let (status, body) = assert_ok(do_request("POST", url, Some(&raw)).await);
    let parsed = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("non-JSON answer from {}: {} ({:?})", url, e, body));
    (status, parsed)
}

/// Polls `check` every 50ms until it holds or `within` elapses.
pub async fn wait_until<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Asserts that an error is None.
pub fn assert_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| panic!("unexpected error: {}", e))
}

/// Asserts that two values are equal.
pub fn assert_equal<T: PartialEq + std::fmt::Debug>(want: T, got: T) {
    if want != got {
        panic!("want={:?} got={:?}", want, got);
    }
}

pub fn body_str(body: &[u8]) -> &str {
    std::str::from_utf8(body).unwrap_or("<binary>")
}
