use serde::{Deserialize, Serialize};

use crate::analysis::TimingSummary;
use crate::error::HarnessError;

/// Overall result of one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Passed,
    Failed,
    Skipped,
}

/// One diagnostic line attached to a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Device or profile cannot run this scenario
    Skipped { reason: String },

    /// A frame barrier timed out
    Stalled {
        requested: u64,
        observed: u64,
        timeout_ms: u64,
    },

    /// A state change, read-back or lifecycle call failed
    DeviceFailure { detail: String },

    MetadataMismatch {
        mismatches: u64,
        compared: u64,
        first_mismatch: Option<u64>,
    },

    FrameShortfall { expected: u64, observed: u64 },

    TimingRegression {
        raw_rate_percent: f64,
        adjusted_rate_percent: f64,
        ceiling_percent: f64,
    },

    /// Comparison against the baseline run, informational only
    BaselineComparison { baseline_spikes: u64, spikes: u64 },

    /// Spikes attributed to deliberate exposure transitions
    ExpectedSpikes {
        expected: u64,
        unexpected: u64,
        adjusted_gaps: u64,
    },

    Note { message: String },
}

impl Diagnostic {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Stalled { .. }
                | Self::DeviceFailure { .. }
                | Self::MetadataMismatch { .. }
                | Self::FrameShortfall { .. }
                | Self::TimingRegression { .. }
        )
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::Note {
            message: message.into(),
        }
    }
}

impl From<&HarnessError> for Diagnostic {
    fn from(err: &HarnessError) -> Self {
        match err {
            HarnessError::ConfigurationUnavailable(reason) => Self::Skipped {
                reason: reason.clone(),
            },
            HarnessError::StabilizationTimeout {
                requested,
                observed,
                timeout,
            } => Self::Stalled {
                requested: *requested,
                observed: *observed,
                timeout_ms: timeout.as_millis() as u64,
            },
            other => Self::DeviceFailure {
                detail: other.to_string(),
            },
        }
    }
}

/// Summary of the baseline run, carried into later scenarios for comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub frames: u64,
    pub spike_count: u64,
    pub spike_rate_percent: f64,
    pub avg_frame_time_ms: f64,
}

impl From<&TimingSummary> for BaselineSummary {
    fn from(summary: &TimingSummary) -> Self {
        Self {
            frames: summary.frames,
            spike_count: summary.spikes,
            spike_rate_percent: summary.spike_rate_percent,
            avg_frame_time_ms: summary.avg_frame_time_ms,
        }
    }
}

/// Structured outcome of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVerdict {
    pub name: String,
    pub frames_observed: u64,
    pub metadata_mismatches: u64,
    pub timing: Option<TimingSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScenarioVerdict {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames_observed: 0,
            metadata_mismatches: 0,
            timing: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record an error that ended the scenario early
    pub fn record_error(&mut self, err: &HarnessError) {
        self.push(Diagnostic::from(err));
    }

    pub fn status(&self) -> VerdictStatus {
        if self.diagnostics.iter().any(Diagnostic::is_failure) {
            VerdictStatus::Failed
        } else if self
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Skipped { .. }))
        {
            VerdictStatus::Skipped
        } else {
            VerdictStatus::Passed
        }
    }

    pub fn passed(&self) -> bool {
        self.status() == VerdictStatus::Passed
    }

    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_verdict_passes() {
        let verdict = ScenarioVerdict::new("steady state");
        assert!(verdict.passed());
    }

    #[test]
    fn test_notes_do_not_fail() {
        let mut verdict = ScenarioVerdict::new("rapid toggle");
        verdict.push(Diagnostic::note("fallback profile"));
        verdict.push(Diagnostic::BaselineComparison { baseline_spikes: 1, spikes: 3 });

        assert_eq!(verdict.status(), VerdictStatus::Passed);
    }

    #[test]
    fn test_configuration_unavailable_skips() {
        let mut verdict = ScenarioVerdict::new("accelerated");
        verdict.record_error(&HarnessError::ConfigurationUnavailable("no ae mode".into()));

        assert_eq!(verdict.status(), VerdictStatus::Skipped);
        assert!(!verdict.passed());
    }

    #[test]
    fn test_timeout_fails_as_stall() {
        let mut verdict = ScenarioVerdict::new("rapid toggle");
        verdict.record_error(&HarnessError::StabilizationTimeout {
            requested: 30,
            observed: 4,
            timeout: Duration::from_secs(10),
        });

        assert_eq!(verdict.status(), VerdictStatus::Failed);
        assert_eq!(
            verdict.diagnostics[0],
            Diagnostic::Stalled { requested: 30, observed: 4, timeout_ms: 10_000 }
        );
    }
}
