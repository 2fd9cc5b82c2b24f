//! In-process coordination store with lease-bound keys.
//!
//! Expiry is evaluated lazily: every operation first drops leases whose
//! deadline has passed, together with the keys bound to them. A key is thus
//! never observable once its lease is expired, without a reaper task.

use futures::StreamExt;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{
    keepalive_interval, prefix_range_end, CoordinationStore, KeepAliveAck, KeepAliveStream,
    KeyValue, Lease, LeaseId, Renewal, StoreError, UNBOUNDED_RANGE_END,
};

/// Largest lease TTL the store accepts, matching etcd's limit.
pub const MAX_LEASE_TTL: Duration = Duration::from_secs(9_000_000_000);

/// A live key with its revision bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub kv: KeyValue,
    pub create_revision: i64,
    pub mod_revision: i64,
    pub version: i64,
}

struct LeaseSlot {
    ttl: Duration,
    deadline: Instant,
    keys: HashSet<Vec<u8>>,
}

struct State {
    revision: i64,
    next_lease: LeaseId,
    leases: HashMap<LeaseId, LeaseSlot>,
    kvs: BTreeMap<Vec<u8>, StoredEntry>,
}

impl State {
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|(_, slot)| slot.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            let removed = self.drop_lease(id);
            debug!(
                component = "store",
                event = "lease_expired",
                lease = id,
                keys = removed,
                "lease expired"
            );
        }
    }

    /// Removes a lease and every key bound to it. Returns the number of keys removed.
    fn drop_lease(&mut self, id: LeaseId) -> usize {
        let Some(slot) = self.leases.remove(&id) else {
            return 0;
        };
        let mut removed = 0;
        for key in slot.keys {
            if self.kvs.remove(&key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }
}

/// In-memory [`CoordinationStore`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                revision: 1,
                next_lease: 1,
                leases: HashMap::new(),
                kvs: BTreeMap::new(),
            })),
        }
    }

    fn locked(&self) -> MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.purge_expired(Instant::now());
        state
    }

    /// Current store revision.
    pub fn revision(&self) -> i64 {
        self.locked().revision
    }

    /// Grants a lease. `requested` of 0 lets the store pick the id.
    pub fn grant_lease(&self, ttl: Duration, requested: LeaseId) -> Result<Lease, StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::Rejected {
                status: 400,
                message: "lease TTL must be positive".to_string(),
            });
        }
        if ttl > MAX_LEASE_TTL {
            return Err(StoreError::Rejected {
                status: 400,
                message: "etcdserver: too large lease TTL".to_string(),
            });
        }

        let mut state = self.locked();
        let id = if requested != 0 {
            if requested < 0 || state.leases.contains_key(&requested) {
                return Err(StoreError::Rejected {
                    status: 400,
                    message: format!("lease {} already exists or is invalid", requested),
                });
            }
            requested
        } else {
            while state.leases.contains_key(&state.next_lease) {
                state.next_lease += 1;
            }
            let id = state.next_lease;
            state.next_lease += 1;
            id
        };

        state.leases.insert(
            id,
            LeaseSlot {
                ttl,
                deadline: Instant::now() + ttl,
                keys: HashSet::new(),
            },
        );

        Ok(Lease { id, ttl })
    }

    /// Extends a lease by its full TTL.
    pub fn renew(&self, id: LeaseId) -> Result<KeepAliveAck, StoreError> {
        let mut state = self.locked();
        let slot = state
            .leases
            .get_mut(&id)
            .ok_or(StoreError::LeaseNotFound(id))?;
        slot.deadline = Instant::now() + slot.ttl;
        Ok(KeepAliveAck { id, ttl: slot.ttl })
    }

    /// Revokes a lease immediately, deleting its keys.
    pub fn revoke(&self, id: LeaseId) -> Result<(), StoreError> {
        let mut state = self.locked();
        if !state.leases.contains_key(&id) {
            return Err(StoreError::LeaseNotFound(id));
        }
        let removed = state.drop_lease(id);
        debug!(
            component = "store",
            event = "lease_revoked",
            lease = id,
            keys = removed,
            "lease revoked"
        );
        Ok(())
    }

    /// Remaining TTL of a lease, `None` once expired or revoked.
    pub fn time_to_live(&self, id: LeaseId) -> Option<Duration> {
        let state = self.locked();
        state
            .leases
            .get(&id)
            .map(|slot| slot.deadline.saturating_duration_since(Instant::now()))
    }

    /// Writes a key, optionally bound to a lease. Returns the new revision.
    pub fn put_entry(&self, key: Vec<u8>, value: Vec<u8>, lease: LeaseId) -> Result<i64, StoreError> {
        if key.is_empty() {
            return Err(StoreError::Rejected {
                status: 400,
                message: "key is not provided".to_string(),
            });
        }

        let mut state = self.locked();
        if lease != 0 && !state.leases.contains_key(&lease) {
            return Err(StoreError::LeaseNotFound(lease));
        }

        state.revision += 1;
        let revision = state.revision;

        let previous = state.kvs.get(&key).map(|e| (e.kv.lease, e.create_revision, e.version));
        let (create_revision, version) = match previous {
            Some((old_lease, create_revision, version)) => {
                if old_lease != lease {
                    if let Some(slot) = state.leases.get_mut(&old_lease) {
                        slot.keys.remove(&key);
                    }
                }
                (create_revision, version + 1)
            }
            None => (revision, 1),
        };

        if let Some(slot) = state.leases.get_mut(&lease) {
            slot.keys.insert(key.clone());
        }

        state.kvs.insert(
            key.clone(),
            StoredEntry {
                kv: KeyValue { key, value, lease },
                create_revision,
                mod_revision: revision,
                version,
            },
        );

        Ok(revision)
    }

    /// Reads `[key, range_end)`. An empty `range_end` reads the single key,
    /// [`UNBOUNDED_RANGE_END`] reads every key from `key` onwards.
    pub fn range(&self, key: &[u8], range_end: &[u8]) -> (Vec<StoredEntry>, i64) {
        let state = self.locked();

        let entries = if range_end.is_empty() {
            state.kvs.get(key).cloned().into_iter().collect()
        } else {
            let upper = if range_end == UNBOUNDED_RANGE_END {
                Bound::Unbounded
            } else {
                Bound::Excluded(range_end.to_vec())
            };
            if let Bound::Excluded(ref end) = upper {
                if end.as_slice() <= key {
                    return (Vec::new(), state.revision);
                }
            }
            state
                .kvs
                .range((Bound::Included(key.to_vec()), upper))
                .map(|(_, e)| e.clone())
                .collect()
        };

        (entries, state.revision)
    }
}

#[async_trait::async_trait]
impl CoordinationStore for MemoryStore {
    async fn grant(&self, ttl: Duration) -> Result<Lease, StoreError> {
        self.grant_lease(ttl, 0)
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<(), StoreError> {
        self.put_entry(key.as_bytes().to_vec(), value, lease).map(|_| ())
    }

    async fn keepalive(&self, lease: LeaseId) -> Result<KeepAliveStream, StoreError> {
        let first = self.renew(lease)?;
        let interval = keepalive_interval(first.ttl);
        let store = self.clone();

        let stream = futures::stream::unfold(Renewal::First(first), move |step| {
            let store = store.clone();
            async move {
                match step {
                    Renewal::Done => None,
                    Renewal::First(ack) => Some((Ok(ack), Renewal::Next)),
                    Renewal::Next => {
                        tokio::time::sleep(interval).await;
                        store.renew(lease).ok().map(|ack| (Ok(ack), Renewal::Next))
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, StoreError> {
        let prefix = prefix.as_bytes();
        let (entries, _) = self.range(prefix, &prefix_range_end(prefix));
        Ok(entries.into_iter().map(|e| e.kv).collect())
    }
}
