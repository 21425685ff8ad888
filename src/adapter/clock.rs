//! Clock implementations

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::port::clock::Clock;

/// Wall clock of the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from tokio's clock
///
/// Starts at `base` and advances with `tokio::time`, so under a paused runtime
/// `tokio::time::advance` moves both timers and wall time together.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base:    DateTime<Utc>,
    started: Instant
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self { base, started: Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().duration_since(self.started);
        self.base + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
