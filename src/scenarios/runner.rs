use tracing::info;

use super::{baseline, extreme_recovery, rapid_toggle, steady_state};
use crate::config::HarnessConfig;
use crate::hal::{AutoExposureMode, Device};
use crate::observability::RunReport;

/// Runs every scenario against one device, in a fixed order.
///
/// Each scenario opens and tears down its own session, so a stall or failure
/// in one never leaks into the next. The baseline summary is the only thing
/// carried forward.
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub async fn run_all(&self, device: &mut dyn Device) -> RunReport {
        let mut report = RunReport::new(device.name());
        info!(device = device.name(), "starting auto-exposure harness");

        let (verdict, baseline) = baseline::run(device, &self.config).await;
        report.push(verdict);

        for (ae_enabled, mode) in [
            (true, AutoExposureMode::Regular),
            (true, AutoExposureMode::Accelerated),
            (false, AutoExposureMode::Regular),
        ] {
            report.push(steady_state::run(device, &self.config, ae_enabled, mode).await);
        }

        for mode in [AutoExposureMode::Regular, AutoExposureMode::Accelerated] {
            report.push(rapid_toggle::run(device, &self.config, mode, baseline.as_ref()).await);
        }

        report.push(extreme_recovery::run(device, &self.config, baseline.as_ref()).await);

        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "harness finished"
        );
        report
    }
}
