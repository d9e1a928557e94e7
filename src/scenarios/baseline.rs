use tracing::info;

use super::{controller_for, millis, select_profile, BaselineSummary, Diagnostic, ScenarioVerdict};
use crate::analysis::TimingAnalyzer;
use crate::config::HarnessConfig;
use crate::engine::StateController;
use crate::error::HarnessResult;
use crate::hal::{Device, MetadataField};

pub const NAME: &str = "baseline streaming";

/// Stream with auto-exposure on and no state changes, measuring frame timing.
///
/// Returns the baseline summary when enough frames were collected; later
/// scenarios log their spike counts against it.
pub async fn run(device: &mut dyn Device, config: &HarnessConfig) -> (ScenarioVerdict, Option<BaselineSummary>) {
    let mut verdict = ScenarioVerdict::new(NAME);
    let Some(profile) = select_profile(&*device, &config.profile, &mut verdict) else {
        return (verdict, None);
    };

    let mut controller = controller_for(device, profile, config);
    let result = drive(&mut controller, config).await;
    let monitor = controller.finish().await;
    verdict.frames_observed = monitor.as_ref().map_or(0, |m| m.count());

    if let Err(e) = result {
        verdict.record_error(&e);
        return (verdict, None);
    }

    let timestamps = monitor.map(|m| m.timestamps()).unwrap_or_default();
    let analyzer = TimingAnalyzer::new(profile.frame_time_ms(), config.timing.spike_threshold_percent);
    let summary = analyzer.summarize(&timestamps);

    info!(
        frames = summary.frames,
        avg_frame_time_ms = summary.avg_frame_time_ms,
        expected_ms = profile.frame_time_ms(),
        spikes = summary.spikes,
        gaps = summary.gaps,
        spike_rate_percent = summary.spike_rate_percent,
        "baseline timing"
    );

    let ceiling = config.timing.max_spike_rate_percent;
    if summary.spike_rate_percent >= ceiling {
        verdict.push(Diagnostic::TimingRegression {
            raw_rate_percent: summary.spike_rate_percent,
            adjusted_rate_percent: summary.spike_rate_percent,
            ceiling_percent: ceiling,
        });
    }
    verdict.timing = Some(summary);

    (verdict, Some(BaselineSummary::from(&summary)))
}

async fn drive(controller: &mut StateController<'_>, config: &HarnessConfig) -> HarnessResult<()> {
    controller.begin_streaming(MetadataField::AutoExposure).await?;
    controller.set_auto_exposure(true)?;
    controller.warm_up(millis(config.baseline.warmup_ms)).await?;
    controller
        .collect_within(config.baseline.frames, true, millis(config.baseline.timeout_ms))
        .await?;
    Ok(())
}
