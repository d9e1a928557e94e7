use tracing::{info, warn};

use super::{apply_ae_mode, controller_for, millis, mode_label, select_profile, Diagnostic, ScenarioVerdict};
use crate::analysis::metadata;
use crate::config::HarnessConfig;
use crate::core::ToggleWindow;
use crate::engine::StateController;
use crate::error::HarnessResult;
use crate::hal::{AutoExposureMode, Device, DeviceOption, MetadataField};

pub fn name(ae_enabled: bool, mode: AutoExposureMode) -> String {
    if ae_enabled {
        format!("steady state: auto-exposure on ({})", mode_label(mode))
    } else {
        "steady state: auto-exposure off".to_string()
    }
}

/// Fix the AE state before streaming, then verify that every frame of a short
/// window reports it.
///
/// Requires the exact configured profile. An unsupported AE mode skips the
/// scenario instead of failing it.
pub async fn run(
    device: &mut dyn Device,
    config: &HarnessConfig,
    ae_enabled: bool,
    mode: AutoExposureMode,
) -> ScenarioVerdict {
    let mut verdict = ScenarioVerdict::new(name(ae_enabled, mode));
    let Some(profile) = select_profile(&*device, &config.profile.exact(), &mut verdict) else {
        return verdict;
    };

    let mut controller = controller_for(device, profile, config);
    let result = drive(&mut controller, config, ae_enabled, mode).await;
    let monitor = controller.finish().await;
    verdict.frames_observed = monitor.as_ref().map_or(0, |m| m.count());

    let window = match result {
        Ok(window) => window,
        Err(e) => {
            verdict.record_error(&e);
            return verdict;
        }
    };

    let events = monitor.map(|m| m.snapshot_all()).unwrap_or_default();
    let check = metadata::check_window(&events, &window);
    verdict.metadata_mismatches = check.mismatches;

    info!(
        scenario = %verdict.name,
        frames = window.len(),
        compared = check.compared,
        skipped = check.skipped,
        mismatches = check.mismatches,
        "steady state metadata verified"
    );

    if check.mismatches > 0 {
        verdict.push(Diagnostic::MetadataMismatch {
            mismatches: check.mismatches,
            compared: check.compared,
            first_mismatch: check.first_mismatch,
        });
    }
    if check.compared == 0 {
        warn!(scenario = %verdict.name, "no frame carried auto-exposure metadata");
        verdict.push(Diagnostic::note("no frame in the window carried auto-exposure metadata"));
    }
    verdict
}

async fn drive(
    controller: &mut StateController<'_>,
    config: &HarnessConfig,
    ae_enabled: bool,
    mode: AutoExposureMode,
) -> HarnessResult<ToggleWindow> {
    if ae_enabled {
        apply_ae_mode(controller, mode)?;
    }
    controller.request_confirmed(DeviceOption::EnableAutoExposure, f64::from(u8::from(ae_enabled)))?;

    controller.begin_streaming(MetadataField::AutoExposure).await?;
    // Changed before the first frame, nothing to stabilize
    controller.settle_now()?;
    controller
        .collect_within(
            config.steady_state.frames,
            ae_enabled,
            millis(config.steady_state.timeout_ms),
        )
        .await
}
