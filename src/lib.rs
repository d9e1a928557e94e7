pub mod analysis;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod hal;
pub mod observability;
pub mod scenarios;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use scenarios::{ScenarioRunner, ScenarioVerdict};
