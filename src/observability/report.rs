use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scenarios::{Diagnostic, ScenarioVerdict, VerdictStatus};

/// Verdicts of one harness run against one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub device: String,
    pub verdicts: Vec<ScenarioVerdict>,
}

impl RunReport {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            verdicts: Vec::new(),
        }
    }

    pub fn push(&mut self, verdict: ScenarioVerdict) {
        match verdict.status() {
            VerdictStatus::Passed => info!(scenario = %verdict.name, frames = verdict.frames_observed, "scenario passed"),
            VerdictStatus::Skipped => info!(scenario = %verdict.name, "scenario skipped"),
            VerdictStatus::Failed => warn!(
                scenario = %verdict.name,
                failures = verdict.failures().count(),
                "scenario failed"
            ),
        }
        self.verdicts.push(verdict);
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.verdicts.iter().filter(|v| v.status() == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(VerdictStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(VerdictStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(VerdictStatus::Skipped)
    }

    pub fn verdict(&self, name: &str) -> Option<&ScenarioVerdict> {
        self.verdicts.iter().find(|v| v.name == name)
    }

    pub fn generate_report(&self) -> String {
        if self.verdicts.is_empty() {
            return "No scenarios run".to_string();
        }

        let mut report = format!("=== Auto-Exposure Harness: {} ===\n", self.device);

        for verdict in &self.verdicts {
            report.push_str(&format!(
                "\n[{}] {:?}\n  Frames: {}\n  Metadata mismatches: {}\n",
                verdict.name,
                verdict.status(),
                verdict.frames_observed,
                verdict.metadata_mismatches
            ));
            if let Some(timing) = &verdict.timing {
                report.push_str(&format!(
                    "  Timing: {} spike{} in {} gaps ({:.2}%), avg {:.2}ms (nominal {:.2}ms), max gap {:.2}ms\n",
                    timing.spikes,
                    if timing.spikes == 1 { "" } else { "s" },
                    timing.gaps,
                    timing.spike_rate_percent,
                    timing.avg_frame_time_ms,
                    timing.expected_frame_time_ms,
                    timing.max_gap_ms
                ));
            }
            for diagnostic in &verdict.diagnostics {
                report.push_str(&format!("  - {}\n", describe(diagnostic)));
            }
        }

        report.push_str(&format!(
            "\nPassed: {}  Failed: {}  Skipped: {}\n",
            self.passed(),
            self.failed(),
            self.skipped()
        ));
        report
    }
}

fn describe(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::Skipped { reason } => format!("skipped: {}", reason),
        Diagnostic::Stalled {
            requested,
            observed,
            timeout_ms,
        } => format!(
            "stalled: {} of {} frames within {}ms",
            observed, requested, timeout_ms
        ),
        Diagnostic::DeviceFailure { detail } => format!("device failure: {}", detail),
        Diagnostic::MetadataMismatch {
            mismatches,
            compared,
            first_mismatch,
        } => match first_mismatch {
            Some(frame) => format!(
                "metadata mismatch: {} of {} frames, first at frame {}",
                mismatches, compared, frame
            ),
            None => format!("metadata mismatch: {} of {} frames", mismatches, compared),
        },
        Diagnostic::FrameShortfall { expected, observed } => {
            format!("frame shortfall: {} observed, {} required", observed, expected)
        }
        Diagnostic::TimingRegression {
            raw_rate_percent,
            adjusted_rate_percent,
            ceiling_percent,
        } => format!(
            "timing regression: {:.2}% spikes (raw {:.2}%), ceiling {:.2}%",
            adjusted_rate_percent, raw_rate_percent, ceiling_percent
        ),
        Diagnostic::BaselineComparison {
            baseline_spikes,
            spikes,
        } => format!("baseline: {} spikes, this run: {}", baseline_spikes, spikes),
        Diagnostic::ExpectedSpikes {
            expected,
            unexpected,
            adjusted_gaps,
        } => format!(
            "expected spikes: {}, unexpected: {} over {} gaps",
            expected, unexpected, adjusted_gaps
        ),
        Diagnostic::Note { message } => message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = RunReport::new("camera");
        assert_eq!(report.generate_report(), "No scenarios run");
    }

    #[test]
    fn test_report_counts_statuses() {
        let mut report = RunReport::new("camera");
        report.push(ScenarioVerdict::new("baseline streaming"));

        let mut failed = ScenarioVerdict::new("rapid toggle (regular)");
        failed.push(Diagnostic::FrameShortfall { expected: 300, observed: 12 });
        report.push(failed);

        let mut skipped = ScenarioVerdict::new("rapid toggle (accelerated)");
        skipped.push(Diagnostic::Skipped { reason: "no ae mode".into() });
        report.push(skipped);

        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);

        let text = report.generate_report();
        assert!(text.contains("[rapid toggle (regular)] Failed"));
        assert!(text.contains("frame shortfall: 12 observed, 300 required"));
        assert!(text.contains("Passed: 1  Failed: 1  Skipped: 1"));
    }
}
