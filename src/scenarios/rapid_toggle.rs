use tracing::{debug, info};

use super::{
    apply_ae_mode, controller_for, millis, mode_label, select_profile, BaselineSummary, Diagnostic,
    ScenarioVerdict,
};
use crate::analysis::{metadata, MetadataCheck, TimingAnalyzer};
use crate::config::HarnessConfig;
use crate::engine::StateController;
use crate::error::HarnessResult;
use crate::hal::{AutoExposureMode, Device, MetadataField};

pub fn name(mode: AutoExposureMode) -> String {
    format!("rapid toggle ({})", mode_label(mode))
}

/// Toggle auto-exposure `toggles` times on a live stream.
///
/// After each toggle the stream must deliver the stabilization frames, then
/// the following window must report the new state on every frame that carries
/// the metadata. Spikes are compared against the baseline but only fail the
/// run above the configured ceiling.
pub async fn run(
    device: &mut dyn Device,
    config: &HarnessConfig,
    mode: AutoExposureMode,
    baseline: Option<&BaselineSummary>,
) -> ScenarioVerdict {
    let mut verdict = ScenarioVerdict::new(name(mode));
    let Some(profile) = select_profile(&*device, &config.profile, &mut verdict) else {
        return verdict;
    };

    let mut totals = MetadataCheck::default();
    let mut controller = controller_for(device, profile, config);
    let result = drive(&mut controller, config, mode, &mut totals).await;
    let monitor = controller.finish().await;
    verdict.frames_observed = monitor.as_ref().map_or(0, |m| m.count());
    verdict.metadata_mismatches = totals.mismatches;

    if totals.mismatches > 0 {
        verdict.push(Diagnostic::MetadataMismatch {
            mismatches: totals.mismatches,
            compared: totals.compared,
            first_mismatch: totals.first_mismatch,
        });
    }

    if let Err(e) = result {
        verdict.record_error(&e);
        return verdict;
    }

    let settings = &config.rapid_toggle;
    let required = settings.toggles * settings.frames_per_state;
    if verdict.frames_observed < required {
        verdict.push(Diagnostic::FrameShortfall {
            expected: required,
            observed: verdict.frames_observed,
        });
    }

    let timestamps = monitor.map(|m| m.timestamps()).unwrap_or_default();
    let analyzer = TimingAnalyzer::new(profile.frame_time_ms(), config.timing.spike_threshold_percent);
    let summary = analyzer.summarize(&timestamps);
    verdict.timing = Some(summary);

    info!(
        scenario = %verdict.name,
        frames = summary.frames,
        spikes = summary.spikes,
        spike_rate_percent = summary.spike_rate_percent,
        mismatches = totals.mismatches,
        "rapid toggle finished"
    );

    if let Some(baseline) = baseline {
        if summary.spikes > baseline.spike_count {
            debug!(
                baseline = baseline.spike_count,
                spikes = summary.spikes,
                "more spikes than baseline"
            );
        }
        verdict.push(Diagnostic::BaselineComparison {
            baseline_spikes: baseline.spike_count,
            spikes: summary.spikes,
        });
    }

    let ceiling = config.timing.max_spike_rate_percent;
    if summary.spike_rate_percent >= ceiling {
        verdict.push(Diagnostic::TimingRegression {
            raw_rate_percent: summary.spike_rate_percent,
            adjusted_rate_percent: summary.spike_rate_percent,
            ceiling_percent: ceiling,
        });
    }
    verdict
}

async fn drive(
    controller: &mut StateController<'_>,
    config: &HarnessConfig,
    mode: AutoExposureMode,
    totals: &mut MetadataCheck,
) -> HarnessResult<()> {
    let settings = &config.rapid_toggle;
    apply_ae_mode(controller, mode)?;

    let monitor = controller.begin_streaming(MetadataField::AutoExposure).await?;
    let mut ae_enabled = true;
    controller.set_auto_exposure(ae_enabled)?;
    controller.warm_up(millis(settings.warmup_ms)).await?;

    for toggle in 0..settings.toggles {
        if toggle > 0 {
            ae_enabled = !ae_enabled;
            controller.set_auto_exposure(ae_enabled)?;
            controller.stabilize(settings.frames_between_toggles).await?;
        }

        let window = controller.collect(settings.frames_per_state, ae_enabled).await?;
        let events = monitor.snapshot(window.range());
        let check = metadata::check(&events, 0..events.len(), window.expected);
        if check.mismatches > 0 {
            debug!(
                toggle,
                ae_enabled,
                mismatches = check.mismatches,
                first_mismatch = ?check.first_mismatch,
                "metadata disagrees with requested state"
            );
        }
        totals.merge(check);
    }
    Ok(())
}
