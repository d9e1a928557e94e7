use anyhow::{bail, Context};
use aeharness::hal::mock::SimulatedCamera;
use aeharness::observability::init_logging;
use aeharness::{HarnessConfig, ScenarioRunner};

/// Usage: aeharness [harness.json] [camera.json]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => HarnessConfig::load(&path).await?,
        None => HarnessConfig::default(),
    };

    let mut camera = SimulatedCamera::new();
    if let Some(path) = args.next() {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read camera config {}", path))?;
        let value = serde_json::from_str(&content).context("Failed to parse camera config JSON")?;
        camera.configure(value)?;
    }

    let runner = ScenarioRunner::new(config);
    let report = runner.run_all(&mut camera).await;
    println!("{}", report.generate_report());

    if report.failed() > 0 {
        bail!("{} scenario(s) failed", report.failed());
    }
    Ok(())
}
