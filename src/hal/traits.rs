use async_trait::async_trait;
use anyhow::Result;
use super::types::{DeviceOption, FrameCallback, OptionRange, StreamProfile};

/// Capability surface of a streaming sensor.
///
/// Lifecycle calls take `&mut self`; option calls take `&self` because they
/// are issued while the device is delivering frames on its own thread.
#[async_trait]
pub trait Device: Send + Sync {
    /// Human readable device name
    fn name(&self) -> &str;

    /// Stream configurations the device can deliver
    fn stream_profiles(&self) -> Vec<StreamProfile>;

    /// Reserve the sensor for `profile`
    async fn open(&mut self, profile: &StreamProfile) -> Result<()>;

    /// Start delivering frames to `callback` on the device's own thread
    async fn start(&mut self, callback: FrameCallback) -> Result<()>;

    /// Stop delivery. Devices may fail when already stopped.
    async fn stop(&mut self) -> Result<()>;

    /// Release the sensor. Devices may fail when already closed.
    async fn close(&mut self) -> Result<()>;

    /// Whether `option` is exposed by this device
    fn supports(&self, option: DeviceOption) -> bool;

    /// Valid range for `option`
    fn option_range(&self, option: DeviceOption) -> Result<OptionRange>;

    /// Current value of `option`
    fn get_option(&self, option: DeviceOption) -> Result<f64>;

    /// Request a new value for `option`. The device applies it asynchronously.
    fn set_option(&self, option: DeviceOption, value: f64) -> Result<()>;
}
