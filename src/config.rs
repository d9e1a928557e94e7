use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::analysis::DEFAULT_SPIKE_THRESHOLD_PERCENT;
use crate::engine::FrameBarrier;
use crate::hal::ProfileQuery;

/// Complete harness configuration. Every field has a default, so a partial
/// JSON file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub profile: ProfileQuery,
    pub barrier: BarrierConfig,
    pub timing: TimingConfig,
    pub baseline: BaselineConfig,
    pub steady_state: SteadyStateConfig,
    pub rapid_toggle: RapidToggleConfig,
    pub extreme_recovery: ExtremeRecoveryConfig,
}

impl HarnessConfig {
    /// Load from a JSON file; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }

    pub fn frame_barrier(&self) -> FrameBarrier {
        FrameBarrier::new(Duration::from_millis(self.barrier.poll_interval_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    pub poll_interval_ms: u64,
    /// Bound on every stabilization and collection wait
    pub timeout_ms: u64,
}

impl BarrierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Gap above nominal period, in percent, that counts as a spike
    pub spike_threshold_percent: f64,
    /// Spike rate (percent of gaps) at or above which a run is a timing regression
    pub max_spike_rate_percent: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spike_threshold_percent: DEFAULT_SPIKE_THRESHOLD_PERCENT,
            max_spike_rate_percent: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub frames: u64,
    pub timeout_ms: u64,
    pub warmup_ms: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            frames: 400,
            timeout_ms: 20_000,
            warmup_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyStateConfig {
    pub frames: u64,
    pub timeout_ms: u64,
}

impl Default for SteadyStateConfig {
    fn default() -> Self {
        Self {
            frames: 10,
            timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidToggleConfig {
    pub toggles: u64,
    pub frames_per_state: u64,
    pub frames_between_toggles: u64,
    pub warmup_ms: u64,
}

impl Default for RapidToggleConfig {
    fn default() -> Self {
        Self {
            toggles: 10,
            frames_per_state: 10,
            frames_between_toggles: 30,
            warmup_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremeRecoveryConfig {
    pub iterations: u64,
    /// Manual exposure as a multiple of the nominal frame period
    pub exposure_multiplier: f64,
    pub manual_hold_ms: u64,
    pub auto_hold_ms: u64,
    /// Spikes each iteration is expected to cause (one per transition)
    pub expected_spikes_per_iteration: u64,
    /// Frames after switching back to auto that still carry the manual exposure
    pub transition_frames_to_skip: u64,
}

impl Default for ExtremeRecoveryConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            exposure_multiplier: 2.0,
            manual_hold_ms: 1_500,
            auto_hold_ms: 1_500,
            expected_spikes_per_iteration: 2,
            transition_frames_to_skip: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HarnessConfig::from_json(
            r#"{ "rapid_toggle": { "toggles": 4 }, "timing": { "max_spike_rate_percent": 2.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.rapid_toggle.toggles, 4);
        assert_eq!(config.rapid_toggle.frames_per_state, 10);
        assert_eq!(config.timing.max_spike_rate_percent, 2.5);
        assert_eq!(config.timing.spike_threshold_percent, 10.0);
        assert_eq!(config.extreme_recovery.expected_spikes_per_iteration, 2);
    }

    #[test]
    fn test_defaults_match_reference_run() {
        let config = HarnessConfig::default();

        assert_eq!(config.profile.fps, 30);
        assert!(config.profile.allow_fallback);
        assert_eq!(config.barrier.poll_interval_ms, 10);
        assert_eq!(config.baseline.frames, 400);
        assert_eq!(config.extreme_recovery.iterations, 20);
        assert_eq!(config.extreme_recovery.transition_frames_to_skip, 2);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(HarnessConfig::from_json("{ not json").is_err());
    }
}
