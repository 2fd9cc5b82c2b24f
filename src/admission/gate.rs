//! Non-blocking bounded admission gate.
//!
//! `try_acquire` either hands out a [`Permit`] right away or rejects; it never
//! waits. The slot goes back to the gate when the permit is released or dropped,
//! so every exit path of the guarded work (error, cancellation, panic) frees it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("service at capacity")]
pub struct AdmissionRejected;

/// Bounded counting gate shared by every request of a node.
#[derive(Debug)]
pub struct AdmissionGate {
    slots: Option<Arc<Semaphore>>,
    capacity: Option<usize>,
    in_flight: Arc<AtomicUsize>,
}

impl AdmissionGate {
    /// Gate admitting at most `capacity` holders at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Some(Arc::new(Semaphore::new(capacity))),
            capacity: Some(capacity),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Gate that never rejects.
    pub fn unbounded() -> Self {
        Self {
            slots: None,
            capacity: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds the gate from the admission settings.
    pub fn from_settings(enabled: bool, capacity: usize) -> Self {
        if enabled {
            Self::new(capacity)
        } else {
            Self::unbounded()
        }
    }

    /// Takes a slot if one is free, otherwise rejects immediately.
    pub fn try_acquire(&self) -> Result<Permit, AdmissionRejected> {
        let slot = match &self.slots {
            Some(slots) => Some(
                slots
                    .clone()
                    .try_acquire_owned()
                    .map_err(|_| AdmissionRejected)?,
            ),
            None => None,
        };
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        Ok(Permit {
            _slot: slot,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Configured capacity, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Free slots, `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// One granted admission. Releasing is consuming, so it happens exactly once.
#[derive(Debug)]
pub struct Permit {
    // `drop` runs before the slot field is released, so the counter never
    // exceeds capacity.
    in_flight: Arc<AtomicUsize>,
    _slot: Option<OwnedSemaphorePermit>,
}

impl Permit {
    /// Gives the slot back.
    pub fn release(self) {}
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
