use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::error;

use crate::core::StreamMonitor;

/// Poll interval used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What a barrier wait observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierOutcome {
    pub requested: u64,
    pub observed: u64,
    pub elapsed: Duration,
}

impl BarrierOutcome {
    pub fn is_satisfied(&self) -> bool {
        self.observed >= self.requested
    }
}

/// Bounded wait for a monitor's frame count to advance.
///
/// Polls on a fixed tick; a wait never retries on its own and never outlives
/// its timeout by more than one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBarrier {
    poll_interval: Duration,
}

impl FrameBarrier {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `frames` more frames than at call time have been recorded
    pub async fn wait(&self, monitor: &StreamMonitor, frames: u64, timeout: Duration) -> BarrierOutcome {
        let base = monitor.count();
        let started = Instant::now();

        loop {
            let observed = monitor.count().saturating_sub(base);
            let elapsed = started.elapsed();
            let outcome = BarrierOutcome {
                requested: frames,
                observed,
                elapsed,
            };

            if outcome.is_satisfied() {
                return outcome;
            }
            if elapsed >= timeout {
                error!(
                    requested = frames,
                    observed,
                    waited_ms = elapsed.as_millis() as u64,
                    "timeout waiting for frames"
                );
                return outcome;
            }

            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// `true` if `frames` new frames arrived within `timeout`
    pub async fn wait_for_new_frames(&self, monitor: &StreamMonitor, frames: u64, timeout: Duration) -> bool {
        self.wait(monitor, frames, timeout).await.is_satisfied()
    }
}

impl Default for FrameBarrier {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
