//! Coordination store abstraction: leases, lease-bound keys and prefix queries.
//!
//! Two implementations exist:
//! - [`MemoryStore`] keeps everything in process and enforces lease expiry itself.
//! - [`RemoteStore`] talks to an etcd v3 JSON gateway (or to a `leasemesh store`
//!   process, which serves the same API from a [`MemoryStore`]).

pub mod memory;
pub mod remote;
pub mod wire;


use futures::stream::BoxStream;
use std::time::Duration;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// Opaque lease handle. `0` means "no lease" in put requests.
pub type LeaseId = i64;

/// Lowest renewal period, whatever the TTL.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// A granted lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub id: LeaseId,
    pub ttl: Duration,
}

/// One live entry returned by a prefix query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub lease: LeaseId,
}

impl KeyValue {
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

/// Acknowledgement of one successful renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveAck {
    pub id: LeaseId,
    /// Remaining TTL after the renewal.
    pub ttl: Duration,
}

/// Renewal acknowledgements for one lease.
///
/// The stream ends (or yields an error and then ends) once the lease can no
/// longer be renewed. Dropping the stream stops renewing.
pub type KeepAliveStream = BoxStream<'static, Result<KeepAliveAck, StoreError>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("coordination store is unreachable: {0}")]
    Connection(String),
    #[error("requested lease not found: {0}")]
    LeaseNotFound(LeaseId),
    #[error("coordination store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed coordination store response: {0}")]
    Decode(String),
}

/// Client side contract of the coordination store.
#[async_trait::async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Grants a lease; keys bound to it vanish once it expires.
    async fn grant(&self, ttl: Duration) -> Result<Lease, StoreError>;

    /// Writes `value` under `key`, bound to `lease` (0 for no lease).
    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<(), StoreError>;

    /// Starts renewing `lease` every TTL/3.
    async fn keepalive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError>;

    /// Lists live entries under `prefix`, ordered by key.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, StoreError>;
}

/// Progress of a keepalive stream.
pub(crate) enum Renewal {
    /// Acknowledgement of the setup renewal, delivered without waiting.
    First(KeepAliveAck),
    Next,
    Done,
}

/// Renewal period for a lease with the given TTL.
pub fn keepalive_interval(ttl: Duration) -> Duration {
    (ttl / 3).max(MIN_KEEPALIVE_INTERVAL)
}

/// Range end meaning "every key from the start key onwards".
pub const UNBOUNDED_RANGE_END: &[u8] = &[0];

/// Exclusive upper bound of the key range sharing `prefix`.
///
/// Returns [`UNBOUNDED_RANGE_END`] when no upper bound exists (the prefix is
/// empty or made of 0xff bytes only).
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    UNBOUNDED_RANGE_END.to_vec()
}
