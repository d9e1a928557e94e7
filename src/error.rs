use std::time::Duration;
use crate::hal::DeviceOption;

/// Failures that end a scenario early
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// No usable stream profile or the device lacks a capability; the scenario is skipped
    #[error("configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    /// A frame barrier ran out of time; the stream is considered stalled
    #[error("timed out after {timeout:?} waiting for {requested} frames, observed {observed}")]
    StabilizationTimeout {
        requested: u64,
        observed: u64,
        timeout: Duration,
    },

    #[error("device rejected {option} = {value}: {reason}")]
    StateChangeRejected {
        option: DeviceOption,
        value: f64,
        reason: String,
    },

    #[error("{option} read back as {actual}, requested {requested}")]
    ConfirmationMismatch {
        option: DeviceOption,
        requested: f64,
        actual: f64,
    },

    #[error(transparent)]
    Device(#[from] anyhow::Error),
}

impl HarnessError {
    /// Whether the scenario should be reported as skipped rather than failed
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::ConfigurationUnavailable(_))
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
