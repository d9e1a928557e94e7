pub mod barrier;
pub mod controller;
pub mod state;

pub use barrier::{BarrierOutcome, FrameBarrier, DEFAULT_POLL_INTERVAL};
pub use controller::StateController;
pub use state::ControlPhase;
