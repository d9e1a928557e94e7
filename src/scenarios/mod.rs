pub mod baseline;
pub mod extreme_recovery;
pub mod rapid_toggle;
pub mod runner;
pub mod steady_state;
pub mod verdict;

pub use extreme_recovery::{RecoveryWindow, SpikeAdjustment};
pub use runner::ScenarioRunner;
pub use verdict::{BaselineSummary, Diagnostic, ScenarioVerdict, VerdictStatus};

use std::time::Duration;

use crate::config::HarnessConfig;
use crate::engine::StateController;
use crate::error::{HarnessError, HarnessResult};
use crate::hal::{
    AutoExposureMode, Device, DeviceOption, ProfileQuery, StreamProfile, StreamingSession,
};

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Resolve the stream profile, recording a skip or a fallback note on the verdict
pub(crate) fn select_profile(
    device: &dyn Device,
    query: &ProfileQuery,
    verdict: &mut ScenarioVerdict,
) -> Option<StreamProfile> {
    match query.select(&device.stream_profiles()) {
        Ok(selection) => {
            if !selection.exact {
                verdict.push(Diagnostic::note(format!(
                    "no exact profile match, using fallback {}",
                    selection.profile
                )));
            }
            Some(selection.profile)
        }
        Err(e) => {
            verdict.record_error(&e);
            None
        }
    }
}

pub(crate) fn controller_for<'d>(
    device: &'d mut dyn Device,
    profile: StreamProfile,
    config: &HarnessConfig,
) -> StateController<'d> {
    StateController::new(
        StreamingSession::new(device, profile),
        config.frame_barrier(),
        config.barrier.timeout(),
    )
}

/// Select the AE algorithm. Devices without the option only run `Regular`.
pub(crate) fn apply_ae_mode(controller: &mut StateController<'_>, mode: AutoExposureMode) -> HarnessResult<()> {
    if controller.device().supports(DeviceOption::AutoExposureMode) {
        controller.request_confirmed(DeviceOption::AutoExposureMode, mode.as_value())
    } else if mode == AutoExposureMode::Regular {
        Ok(())
    } else {
        Err(HarnessError::ConfigurationUnavailable(format!(
            "{} not supported by {}",
            DeviceOption::AutoExposureMode,
            controller.device().name()
        )))
    }
}

pub(crate) fn mode_label(mode: AutoExposureMode) -> &'static str {
    match mode {
        AutoExposureMode::Regular => "regular",
        AutoExposureMode::Accelerated => "accelerated",
    }
}
