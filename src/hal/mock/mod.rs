pub mod camera;

pub use camera::{SimulatedCamera, SimulatedCameraConfig};
