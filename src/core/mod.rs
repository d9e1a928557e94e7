pub mod frame;
pub mod monitor;
pub mod window;

pub use frame::FrameEvent;
pub use monitor::StreamMonitor;
pub use window::ToggleWindow;
