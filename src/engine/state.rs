use crate::hal::DeviceOption;

/// Phase of the controller within one state-change cycle
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPhase {
    Idle,
    Requested {
        option: DeviceOption,
        value: f64,
    },
    /// Waiting for the device to settle; frames seen now are not representative
    Stabilizing {
        frames: u64,
    },
    /// Frames from `since_frame` on reflect the requested state
    Settled {
        since_frame: u64,
    },
    /// A barrier timed out; the session has been torn down
    Stalled {
        requested: u64,
        observed: u64,
    },
}

impl ControlPhase {
    /// Check if transition from current phase to target phase is valid
    pub fn can_transition_to(&self, target: &ControlPhase) -> bool {
        use ControlPhase::*;

        matches!(
            (self, target),
            // From Idle: first request, or streaming settled without a change
            (Idle, Requested { .. }) |
            (Idle, Settled { .. }) |

            // From Requested: more writes, wait, or settle immediately when not streaming
            (Requested { .. }, Requested { .. }) |
            (Requested { .. }, Stabilizing { .. }) |
            (Requested { .. }, Settled { .. }) |
            (Requested { .. }, Stalled { .. }) |

            // From Stabilizing
            (Stabilizing { .. }, Settled { .. }) |
            (Stabilizing { .. }, Stalled { .. }) |

            // From Settled: next cycle, re-settle after a hold, or stall while collecting
            (Settled { .. }, Requested { .. }) |
            (Settled { .. }, Settled { .. }) |
            (Settled { .. }, Stalled { .. })
        )
    }

    /// Get human-readable phase name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Requested { .. } => "Requested",
            Self::Stabilizing { .. } => "Stabilizing",
            Self::Settled { .. } => "Settled",
            Self::Stalled { .. } => "Stalled",
        }
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }
}

impl Default for ControlPhase {
    fn default() -> Self {
        Self::Idle
    }
}
