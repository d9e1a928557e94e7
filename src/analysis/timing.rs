//! Inter-frame timing statistics over host arrival timestamps (ms).
//!
//! Transitions between exposure regimes cost at least one frame period, so any
//! statistic spanning a transition must either start after it (`start`) or
//! account for the expected spikes separately.

use serde::{Deserialize, Serialize};

/// Default spike threshold: gaps more than 10% above the nominal period
pub const DEFAULT_SPIKE_THRESHOLD_PERCENT: f64 = 10.0;

/// Gap above which an inter-frame interval counts as a spike
pub fn spike_threshold(frame_time_ms: f64, spike_threshold_percent: f64) -> f64 {
    frame_time_ms * (1.0 + spike_threshold_percent / 100.0)
}

/// `ts[i] - ts[i-1]` for every i >= 1
pub fn gaps(ts: &[f64]) -> Vec<f64> {
    ts.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Gaps ending at indices `max(1, start + 1)..`
fn gaps_from(ts: &[f64], start: usize) -> impl Iterator<Item = f64> + '_ {
    let first = start.saturating_add(1).max(1);
    (first..ts.len()).map(move |i| ts[i] - ts[i - 1])
}

/// Number of gaps from `start` onward strictly above the spike threshold
pub fn spike_count(ts: &[f64], frame_time_ms: f64, spike_threshold_percent: f64, start: usize) -> u64 {
    let threshold = spike_threshold(frame_time_ms, spike_threshold_percent);
    gaps_from(ts, start).filter(|gap| *gap > threshold).count() as u64
}

/// Mean gap from `start` onward. When a nominal period is given, spike gaps
/// are left out of both the sum and the count. Returns `0.0` without data.
pub fn filtered_average(
    ts: &[f64],
    start: usize,
    frame_time_ms: Option<f64>,
    spike_threshold_percent: f64,
) -> f64 {
    let threshold = frame_time_ms.map(|t| spike_threshold(t, spike_threshold_percent));
    let mut mean = GapMean::default();
    mean.add_range(ts, start, ts.len(), threshold);
    mean.average()
}

/// Largest gap from `start` onward, `0.0` without data
pub fn max_gap(ts: &[f64], start: usize) -> f64 {
    gaps_from(ts, start).fold(0.0, f64::max)
}

/// Number of gaps in a run of `frames` frames, never below 1
pub fn gap_count(frames: usize) -> u64 {
    frames.saturating_sub(1).max(1) as u64
}

/// Percentage of `gaps` that were spikes
pub fn spike_rate_percent(spikes: u64, gaps: u64) -> f64 {
    spikes as f64 / gaps.max(1) as f64 * 100.0
}

/// Running mean over gaps collected from several windows of one log
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GapMean {
    pub sum: f64,
    pub count: u64,
}

impl GapMean {
    /// Add the gaps ending at indices `max(1, start + 1)..end`, skipping those above `threshold`
    pub fn add_range(&mut self, ts: &[f64], start: usize, end: usize, threshold: Option<f64>) {
        let end = end.min(ts.len());
        let first = start.saturating_add(1).max(1);
        for i in first..end {
            let gap = ts[i] - ts[i - 1];
            if threshold.is_some_and(|limit| gap > limit) {
                continue;
            }
            self.sum += gap;
            self.count += 1;
        }
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Timing statistics of one stream against its nominal frame period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub frames: u64,
    pub gaps: u64,
    pub spikes: u64,
    pub spike_rate_percent: f64,
    pub avg_frame_time_ms: f64,
    pub max_gap_ms: f64,
    pub expected_frame_time_ms: f64,
}

/// Spike analysis for a stream with a known nominal frame period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingAnalyzer {
    frame_time_ms: f64,
    spike_threshold_percent: f64,
}

impl TimingAnalyzer {
    pub fn new(frame_time_ms: f64, spike_threshold_percent: f64) -> Self {
        Self {
            frame_time_ms,
            spike_threshold_percent,
        }
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }

    pub fn threshold_ms(&self) -> f64 {
        spike_threshold(self.frame_time_ms, self.spike_threshold_percent)
    }

    pub fn spike_count(&self, ts: &[f64], start: usize) -> u64 {
        spike_count(ts, self.frame_time_ms, self.spike_threshold_percent, start)
    }

    /// Mean gap from `start` onward with spikes excluded
    pub fn filtered_average(&self, ts: &[f64], start: usize) -> f64 {
        filtered_average(ts, start, Some(self.frame_time_ms), self.spike_threshold_percent)
    }

    /// Whole-stream statistics
    pub fn summarize(&self, ts: &[f64]) -> TimingSummary {
        let gaps = gap_count(ts.len());
        let spikes = self.spike_count(ts, 0);
        TimingSummary {
            frames: ts.len() as u64,
            gaps,
            spikes,
            spike_rate_percent: spike_rate_percent(spikes, gaps),
            avg_frame_time_ms: self.filtered_average(ts, 0),
            max_gap_ms: max_gap(ts, 0),
            expected_frame_time_ms: self.frame_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: [f64; 5] = [0.0, 10.0, 20.0, 35.0, 40.0];

    #[test]
    fn test_gaps() {
        assert_eq!(gaps(&TS), vec![10.0, 10.0, 15.0, 5.0]);
        assert!(gaps(&[5.0]).is_empty());
    }

    #[test]
    fn test_single_spike_above_threshold() {
        assert_eq!(spike_count(&TS, 10.0, 10.0, 0), 1);
    }

    #[test]
    fn test_spike_count_respects_start() {
        // start = 2 considers gaps ending at index 3 and 4 only
        assert_eq!(spike_count(&TS, 10.0, 10.0, 2), 1);
        assert_eq!(spike_count(&TS, 10.0, 10.0, 3), 0);
    }

    #[test]
    fn test_gap_equal_to_threshold_is_not_a_spike() {
        let ts = [0.0, 11.0, 22.0];
        assert_eq!(spike_count(&ts, 10.0, 10.0, 0), 0);
    }

    #[test]
    fn test_filtered_average_excludes_spikes() {
        let avg = filtered_average(&TS, 0, Some(10.0), 10.0);
        assert!((avg - 25.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfiltered_average_keeps_spikes() {
        let avg = filtered_average(&TS, 0, None, 10.0);
        assert!((avg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_without_data_is_zero() {
        assert_eq!(filtered_average(&[], 0, Some(10.0), 10.0), 0.0);
        assert_eq!(filtered_average(&[3.0], 0, None, 10.0), 0.0);
        // Every gap is a spike
        assert_eq!(filtered_average(&[0.0, 50.0], 0, Some(10.0), 10.0), 0.0);
    }

    #[test]
    fn test_max_gap() {
        assert_eq!(max_gap(&TS, 0), 15.0);
        assert_eq!(max_gap(&TS, 3), 5.0);
        assert_eq!(max_gap(&[], 0), 0.0);
    }

    #[test]
    fn test_spike_rate_never_divides_by_zero() {
        assert_eq!(gap_count(0), 1);
        assert_eq!(gap_count(1), 1);
        assert_eq!(gap_count(5), 4);
        assert_eq!(spike_rate_percent(1, 4), 25.0);
        assert_eq!(spike_rate_percent(0, 0), 0.0);
    }

    #[test]
    fn test_summary() {
        let summary = TimingAnalyzer::new(10.0, DEFAULT_SPIKE_THRESHOLD_PERCENT).summarize(&TS);

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.gaps, 4);
        assert_eq!(summary.spikes, 1);
        assert_eq!(summary.spike_rate_percent, 25.0);
        assert_eq!(summary.max_gap_ms, 15.0);
    }

    #[test]
    fn test_gap_mean_across_windows() {
        let ts = [0.0, 10.0, 20.0, 60.0, 70.0, 80.0];
        let mut mean = GapMean::default();
        mean.add_range(&ts, 0, 3, Some(11.0));
        mean.add_range(&ts, 3, ts.len(), Some(11.0));

        assert_eq!(mean.count, 4);
        assert_eq!(mean.average(), 10.0);
    }
}
