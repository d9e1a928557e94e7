use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{controller_for, millis, select_profile, BaselineSummary, Diagnostic, ScenarioVerdict};
use crate::analysis::timing::{gap_count, max_gap, spike_rate_percent};
use crate::analysis::{GapMean, TimingAnalyzer, TimingSummary};
use crate::config::HarnessConfig;
use crate::engine::StateController;
use crate::error::{HarnessError, HarnessResult};
use crate::hal::{Device, DeviceOption, MetadataField};

pub const NAME: &str = "extreme recovery";

/// Spike rate with the spikes caused by deliberate transitions taken out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeAdjustment {
    pub raw_spikes: u64,
    pub expected_spikes: u64,
    pub unexpected_spikes: u64,
    pub total_gaps: u64,
    pub adjusted_gaps: u64,
    pub raw_rate_percent: f64,
    pub adjusted_rate_percent: f64,
}

impl SpikeAdjustment {
    /// Each iteration switches regimes twice and may cost one spike per switch;
    /// those are removed from both the spike count and the gap count.
    pub fn compute(raw_spikes: u64, total_gaps: u64, expected_per_iteration: u64, iterations: u64) -> Self {
        let expected_spikes = expected_per_iteration * iterations;
        let unexpected_spikes = raw_spikes.saturating_sub(expected_spikes);
        let adjusted_gaps = total_gaps.saturating_sub(expected_spikes).max(1);

        Self {
            raw_spikes,
            expected_spikes,
            unexpected_spikes,
            total_gaps,
            adjusted_gaps,
            raw_rate_percent: spike_rate_percent(raw_spikes, total_gaps),
            adjusted_rate_percent: spike_rate_percent(unexpected_spikes, adjusted_gaps),
        }
    }
}

/// Spikes and gaps of one auto-exposure window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryWindow {
    pub spikes: u64,
    pub gaps: u64,
}

impl RecoveryWindow {
    /// Measure the timestamps recorded from the switch back to auto onward.
    ///
    /// The first `skip` frames still carry the old exposure; their gaps are
    /// left out of `auto_mean` but still count towards spikes and gaps.
    pub fn measure(ts: &[f64], analyzer: &TimingAnalyzer, skip: usize, auto_mean: &mut GapMean) -> Self {
        auto_mean.add_range(ts, skip, ts.len(), Some(analyzer.threshold_ms()));
        Self {
            spikes: analyzer.spike_count(ts, 0),
            gaps: gap_count(ts.len()),
        }
    }
}

/// Counters accumulated over completed iterations
#[derive(Debug, Default)]
struct RecoveryTotals {
    iterations: u64,
    spikes: u64,
    gaps: u64,
    auto_mean: GapMean,
}

/// Alternate a manual exposure of twice the frame period with auto-exposure.
///
/// The long exposure slows the stream; after switching back to auto the
/// frame rate has to recover. Spikes are counted over each auto window, the
/// two expected per iteration are subtracted and the remaining rate must stay
/// below the ceiling.
pub async fn run(
    device: &mut dyn Device,
    config: &HarnessConfig,
    baseline: Option<&BaselineSummary>,
) -> ScenarioVerdict {
    let mut verdict = ScenarioVerdict::new(NAME);
    let Some(profile) = select_profile(&*device, &config.profile, &mut verdict) else {
        return verdict;
    };

    let analyzer = TimingAnalyzer::new(profile.frame_time_ms(), config.timing.spike_threshold_percent);
    let mut totals = RecoveryTotals::default();
    let mut controller = controller_for(device, profile, config);
    let result = drive(&mut controller, config, &analyzer, &mut totals).await;
    let monitor = controller.finish().await;
    verdict.frames_observed = monitor.as_ref().map_or(0, |m| m.count());

    let settings = &config.extreme_recovery;
    let adjustment = SpikeAdjustment::compute(
        totals.spikes,
        totals.gaps,
        settings.expected_spikes_per_iteration,
        totals.iterations,
    );

    // Completed iterations are reported even when a later one stalled
    if totals.iterations > 0 {
        let timestamps = monitor.map(|m| m.timestamps()).unwrap_or_default();
        verdict.timing = Some(TimingSummary {
            frames: verdict.frames_observed,
            gaps: adjustment.total_gaps,
            spikes: adjustment.raw_spikes,
            spike_rate_percent: adjustment.raw_rate_percent,
            avg_frame_time_ms: totals.auto_mean.average(),
            max_gap_ms: max_gap(&timestamps, 0),
            expected_frame_time_ms: analyzer.frame_time_ms(),
        });
        verdict.push(Diagnostic::ExpectedSpikes {
            expected: adjustment.expected_spikes,
            unexpected: adjustment.unexpected_spikes,
            adjusted_gaps: adjustment.adjusted_gaps,
        });
    }

    info!(
        iterations = totals.iterations,
        frames = verdict.frames_observed,
        auto_avg_frame_time_ms = totals.auto_mean.average(),
        raw_spikes = adjustment.raw_spikes,
        expected_spikes = adjustment.expected_spikes,
        unexpected_spikes = adjustment.unexpected_spikes,
        adjusted_rate_percent = adjustment.adjusted_rate_percent,
        "extreme recovery finished"
    );

    if let Err(e) = result {
        verdict.record_error(&e);
        return verdict;
    }

    if let Some(baseline) = baseline {
        verdict.push(Diagnostic::BaselineComparison {
            baseline_spikes: baseline.spike_count,
            spikes: adjustment.unexpected_spikes,
        });
    }

    if verdict.frames_observed == 0 {
        verdict.push(Diagnostic::FrameShortfall {
            expected: 1,
            observed: 0,
        });
    }

    let ceiling = config.timing.max_spike_rate_percent;
    if adjustment.adjusted_rate_percent >= ceiling {
        verdict.push(Diagnostic::TimingRegression {
            raw_rate_percent: adjustment.raw_rate_percent,
            adjusted_rate_percent: adjustment.adjusted_rate_percent,
            ceiling_percent: ceiling,
        });
    }
    verdict
}

async fn drive(
    controller: &mut StateController<'_>,
    config: &HarnessConfig,
    analyzer: &TimingAnalyzer,
    totals: &mut RecoveryTotals,
) -> HarnessResult<()> {
    let settings = &config.extreme_recovery;
    if !controller.device().supports(DeviceOption::Exposure) {
        return Err(HarnessError::ConfigurationUnavailable(format!(
            "{} not supported by {}",
            DeviceOption::Exposure,
            controller.device().name()
        )));
    }

    let range = controller.device().option_range(DeviceOption::Exposure)?;
    let exposure = range.clamp(controller.profile().frame_time_us() * settings.exposure_multiplier);
    debug!(exposure_us = exposure, min = range.min, max = range.max, "manual exposure selected");

    let monitor = controller.begin_streaming(MetadataField::AutoExposure).await?;
    let skip = settings.transition_frames_to_skip as usize;

    for iteration in 0..settings.iterations {
        controller.set_auto_exposure(false)?;
        controller.request(DeviceOption::Exposure, exposure)?;
        controller.hold(millis(settings.manual_hold_ms)).await?;

        let before_switch = monitor.count();
        controller.set_auto_exposure(true)?;
        controller.hold(millis(settings.auto_hold_ms)).await?;

        let window = monitor.timestamps_from(before_switch);
        let recovery = RecoveryWindow::measure(&window, analyzer, skip, &mut totals.auto_mean);

        totals.spikes += recovery.spikes;
        totals.gaps += recovery.gaps;
        totals.iterations += 1;
        debug!(iteration, spikes = recovery.spikes, gaps = recovery.gaps, "recovery iteration done");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_spikes_are_removed() {
        let adjustment = SpikeAdjustment::compute(42, 1_800, 2, 20);

        assert_eq!(adjustment.expected_spikes, 40);
        assert_eq!(adjustment.unexpected_spikes, 2);
        assert_eq!(adjustment.adjusted_gaps, 1_760);
        assert!((adjustment.adjusted_rate_percent - 2.0 / 1_760.0 * 100.0).abs() < 1e-9);
        assert!(adjustment.raw_rate_percent > adjustment.adjusted_rate_percent);
    }

    #[test]
    fn test_fewer_spikes_than_expected_floor_at_zero() {
        let adjustment = SpikeAdjustment::compute(15, 1_800, 2, 20);

        assert_eq!(adjustment.unexpected_spikes, 0);
        assert_eq!(adjustment.adjusted_rate_percent, 0.0);
    }

    #[test]
    fn test_transition_frames_left_out_of_auto_average() {
        let analyzer = TimingAnalyzer::new(10.0, 10.0);
        // Two off-nominal gaps right after the switch, both under the 11ms threshold
        let ts = [0.0, 10.8, 21.6, 31.6, 41.6, 51.6];

        let mut skipped = GapMean::default();
        let window = RecoveryWindow::measure(&ts, &analyzer, 2, &mut skipped);
        assert_eq!(window, RecoveryWindow { spikes: 0, gaps: 5 });
        assert_eq!(skipped.count, 3);
        assert!((skipped.average() - 10.0).abs() < 1e-9);

        let mut kept = GapMean::default();
        RecoveryWindow::measure(&ts, &analyzer, 0, &mut kept);
        assert_eq!(kept.count, 5);
        assert!((kept.average() - 10.32).abs() < 1e-9);
    }

    #[test]
    fn test_recovery_window_counts_transition_spikes() {
        let analyzer = TimingAnalyzer::new(10.0, 10.0);
        let ts = [0.0, 20.0, 40.0, 50.0, 60.0];

        let mut mean = GapMean::default();
        let window = RecoveryWindow::measure(&ts, &analyzer, 2, &mut mean);

        assert_eq!(window, RecoveryWindow { spikes: 2, gaps: 4 });
        assert_eq!(mean.count, 2);
        assert_eq!(mean.average(), 10.0);
    }

    #[test]
    fn test_empty_window_has_one_gap() {
        let analyzer = TimingAnalyzer::new(10.0, 10.0);
        let mut mean = GapMean::default();

        let window = RecoveryWindow::measure(&[], &analyzer, 2, &mut mean);

        assert_eq!(window, RecoveryWindow { spikes: 0, gaps: 1 });
        assert_eq!(mean.count, 0);
    }

    #[test]
    fn test_adjusted_gaps_never_zero() {
        let adjustment = SpikeAdjustment::compute(3, 2, 2, 1);

        assert_eq!(adjustment.adjusted_gaps, 1);
        assert_eq!(adjustment.unexpected_spikes, 1);
        assert_eq!(adjustment.adjusted_rate_percent, 100.0);
    }
}
