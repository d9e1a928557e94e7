pub mod lifecycle;
pub mod mock;
pub mod profile;
pub mod traits;
pub mod types;

pub use lifecycle::{SessionState, StreamingSession};
pub use profile::{ProfileQuery, ProfileSelection};
pub use traits::Device;
pub use types::{
    AutoExposureMode, DeviceOption, Frame, FrameCallback, MetadataField, OptionRange,
    PixelFormat, StreamProfile, StreamType,
};
