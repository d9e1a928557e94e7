use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use super::barrier::{BarrierOutcome, FrameBarrier};
use super::state::ControlPhase;
use crate::core::{StreamMonitor, ToggleWindow};
use crate::error::{HarnessError, HarnessResult};
use crate::hal::{Device, DeviceOption, MetadataField, StreamProfile, StreamingSession};

/// Largest read-back deviation accepted as "equal to the requested value"
const CONFIRM_TOLERANCE: f64 = 1e-3;

/// Drives device state changes on a streaming session.
///
/// Every change is a single request. Frames become eligible for verification
/// only once the controller is `Settled`, i.e. after a stabilization barrier,
/// a hold, or an explicit `settle_now` when nothing was streaming during the
/// change. A barrier timeout moves the controller to `Stalled` and tears the
/// session down.
pub struct StateController<'d> {
    session: StreamingSession<'d>,
    barrier: FrameBarrier,
    timeout: Duration,
    phase: ControlPhase,
    monitor: Option<Arc<StreamMonitor>>,
}

impl<'d> StateController<'d> {
    /// `timeout` bounds every stabilization and collection wait
    pub fn new(session: StreamingSession<'d>, barrier: FrameBarrier, timeout: Duration) -> Self {
        Self {
            session,
            barrier,
            timeout,
            phase: ControlPhase::Idle,
            monitor: None,
        }
    }

    pub fn phase(&self) -> &ControlPhase {
        &self.phase
    }

    pub fn device(&self) -> &dyn Device {
        self.session.device()
    }

    pub fn profile(&self) -> &StreamProfile {
        self.session.profile()
    }

    pub fn monitor(&self) -> Option<&Arc<StreamMonitor>> {
        self.monitor.as_ref()
    }

    /// Frames recorded by the current stream so far
    pub fn frames_observed(&self) -> u64 {
        self.monitor.as_ref().map_or(0, |monitor| monitor.count())
    }

    fn transition_to(&mut self, next: ControlPhase) -> HarnessResult<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(HarnessError::Device(anyhow!(
                "Invalid control transition: {} -> {}",
                self.phase.name(),
                next.name()
            )));
        }
        self.phase = next;
        Ok(())
    }

    fn active_monitor(&self) -> HarnessResult<Arc<StreamMonitor>> {
        self.monitor
            .clone()
            .ok_or_else(|| HarnessError::Device(anyhow!("No active stream")))
    }

    /// Open and start the session, recording `field` from every frame
    pub async fn begin_streaming(&mut self, field: MetadataField) -> HarnessResult<Arc<StreamMonitor>> {
        if let Err(e) = self.session.open().await {
            self.session.teardown().await;
            return Err(e.into());
        }
        match self.session.start(field).await {
            Ok(monitor) => {
                self.monitor = Some(Arc::clone(&monitor));
                Ok(monitor)
            }
            Err(e) => {
                self.session.teardown().await;
                Err(e.into())
            }
        }
    }

    /// Issue a single state change. A rejection is final.
    pub fn request(&mut self, option: DeviceOption, value: f64) -> HarnessResult<()> {
        self.transition_to(ControlPhase::Requested { option, value })?;
        self.session
            .device()
            .set_option(option, value)
            .map_err(|e| HarnessError::StateChangeRejected {
                option,
                value,
                reason: format!("{:#}", e),
            })?;
        debug!(%option, value, frame = self.frames_observed(), "state change requested");
        Ok(())
    }

    /// Read `option` back and compare it with `requested`
    pub fn confirm(&self, option: DeviceOption, requested: f64) -> HarnessResult<f64> {
        let actual = self.session.device().get_option(option)?;
        if (actual - requested).abs() > CONFIRM_TOLERANCE {
            return Err(HarnessError::ConfirmationMismatch {
                option,
                requested,
                actual,
            });
        }
        Ok(actual)
    }

    /// Request a change and verify it by read-back (static checks only)
    pub fn request_confirmed(&mut self, option: DeviceOption, value: f64) -> HarnessResult<()> {
        self.request(option, value)?;
        self.confirm(option, value)?;
        Ok(())
    }

    pub fn set_auto_exposure(&mut self, enabled: bool) -> HarnessResult<()> {
        self.request(DeviceOption::EnableAutoExposure, if enabled { 1.0 } else { 0.0 })
    }

    /// Declare the current state settled without waiting. Only valid when the
    /// change happened before streaming, or for the initial state.
    pub fn settle_now(&mut self) -> HarnessResult<()> {
        let since_frame = self.frames_observed();
        self.transition_to(ControlPhase::Settled { since_frame })
    }

    /// Let the stream run for `duration`, then treat the current state as settled
    pub async fn warm_up(&mut self, duration: Duration) -> HarnessResult<u64> {
        sleep(duration).await;
        let frames = self.frames_observed();
        debug!(frames, "initial streaming warm-up done");
        self.transition_to(ControlPhase::Settled { since_frame: frames })?;
        Ok(frames)
    }

    /// Require `frames` stabilization frames after a change
    pub async fn stabilize(&mut self, frames: u64) -> HarnessResult<()> {
        let monitor = self.active_monitor()?;
        self.transition_to(ControlPhase::Stabilizing { frames })?;

        let outcome = self.barrier.wait(&monitor, frames, self.timeout).await;
        if !outcome.is_satisfied() {
            return Err(self.stall(outcome, self.timeout).await);
        }

        debug!(frames = outcome.observed, "stabilization frames collected");
        self.transition_to(ControlPhase::Settled {
            since_frame: monitor.count(),
        })
    }

    /// Collect `frames` representative frames of the settled state
    pub async fn collect(&mut self, frames: u64, expected: bool) -> HarnessResult<ToggleWindow> {
        self.collect_within(frames, expected, self.timeout).await
    }

    pub async fn collect_within(
        &mut self,
        frames: u64,
        expected: bool,
        timeout: Duration,
    ) -> HarnessResult<ToggleWindow> {
        if !matches!(self.phase, ControlPhase::Settled { .. }) {
            return Err(HarnessError::Device(anyhow!(
                "Cannot collect frames in phase {}",
                self.phase.name()
            )));
        }
        let monitor = self.active_monitor()?;

        let start = monitor.count();
        let outcome = self.barrier.wait(&monitor, frames, timeout).await;
        if !outcome.is_satisfied() {
            return Err(self.stall(outcome, timeout).await);
        }

        let window = ToggleWindow::new(start, monitor.count(), expected);
        debug!(start = window.start, end = window.end, expected, "collected verification window");
        Ok(window)
    }

    /// Let the stream run for `duration` after a change, then treat it as settled.
    /// A hold without a single frame is a stall.
    pub async fn hold(&mut self, duration: Duration) -> HarnessResult<u64> {
        let monitor = self.active_monitor()?;
        let before = monitor.count();

        sleep(duration).await;

        let after = monitor.count();
        let observed = after.saturating_sub(before);
        if observed == 0 {
            let outcome = BarrierOutcome {
                requested: 1,
                observed,
                elapsed: duration,
            };
            return Err(self.stall(outcome, duration).await);
        }

        self.transition_to(ControlPhase::Settled { since_frame: after })?;
        Ok(observed)
    }

    async fn stall(&mut self, outcome: BarrierOutcome, timeout: Duration) -> HarnessError {
        self.phase = ControlPhase::Stalled {
            requested: outcome.requested,
            observed: outcome.observed,
        };
        error!(
            requested = outcome.requested,
            observed = outcome.observed,
            total_frames = self.frames_observed(),
            "stream stalled, tearing down session"
        );
        self.session.teardown().await;

        HarnessError::StabilizationTimeout {
            requested: outcome.requested,
            observed: outcome.observed,
            timeout,
        }
    }

    /// Tear the session down and hand back the frame log
    pub async fn finish(mut self) -> Option<Arc<StreamMonitor>> {
        self.session.teardown().await;
        self.monitor
    }
}
