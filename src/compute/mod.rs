// Package compute provides the expensive work guarded by the admission gate.

use rand::Rng;
use std::time::Duration;


#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("result of {0} * 2 does not fit in 64 bits")]
    Overflow(i64),
}

/// Bounds of the artificial processing delay, `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDelay {
    pub min: Duration,
    pub max: Duration,
}

impl WorkDelay {
    pub const NONE: WorkDelay = WorkDelay {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Draws a delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }
}

/// Doubles a number after simulated expensive processing.
#[derive(Debug, Clone)]
pub struct Multiplier {
    delay: WorkDelay,
}

impl Multiplier {
    pub fn new(delay: WorkDelay) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> WorkDelay {
        self.delay
    }

    pub async fn run(&self, n: i64) -> Result<i64, ComputeError> {
        let pause = self.delay.sample();
        tokio::time::sleep(pause).await;
        n.checked_mul(2).ok_or(ComputeError::Overflow(n))
    }
}
