use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stream classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Depth,
    Infrared,
    Color,
}

/// Pixel format of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Z16,  // 16-bit depth
    Y8,   // 8-bit luminance
    Y16,  // 16-bit luminance
    Rgb8,
}

/// One stream configuration offered by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub stream: StreamType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamProfile {
    /// Nominal frame period in milliseconds
    pub fn frame_time_ms(&self) -> f64 {
        1000.0 / f64::from(self.fps.max(1))
    }

    /// Nominal frame period in microseconds (the unit of the exposure option)
    pub fn frame_time_us(&self) -> f64 {
        self.frame_time_ms() * 1000.0
    }
}

impl fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?} {}x{}@{}fps",
            self.stream, self.format, self.width, self.height, self.fps
        )
    }
}

/// Controls exposed by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOption {
    /// 0 = manual exposure, 1 = auto-exposure
    EnableAutoExposure,
    /// Auto-exposure algorithm, see [`AutoExposureMode`]
    AutoExposureMode,
    /// Manual exposure time in microseconds
    Exposure,
}

impl DeviceOption {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnableAutoExposure => "enable_auto_exposure",
            Self::AutoExposureMode => "auto_exposure_mode",
            Self::Exposure => "exposure",
        }
    }
}

impl fmt::Display for DeviceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Auto-exposure algorithm selected through [`DeviceOption::AutoExposureMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoExposureMode {
    Regular,
    Accelerated,
}

impl AutoExposureMode {
    pub fn as_value(self) -> f64 {
        match self {
            Self::Regular => 0.0,
            Self::Accelerated => 1.0,
        }
    }

    pub fn from_value(value: f64) -> Option<Self> {
        match value.round() as i64 {
            0 => Some(Self::Regular),
            1 => Some(Self::Accelerated),
            _ => None,
        }
    }
}

/// Valid range of an option
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl OptionRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-frame metadata attached out of band by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// 0 when auto-exposure was off for this frame, nonzero when on
    AutoExposure,
    /// Exposure actually used for this frame, in microseconds
    ActualExposure,
    FrameCounter,
}

/// A frame delivered by a device
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub stream: StreamType,
    pub frame_number: u64,
    pub metadata: HashMap<MetadataField, i64>,
}

impl Frame {
    pub fn new(stream: StreamType, frame_number: u64) -> Self {
        Self {
            stream,
            frame_number,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, field: MetadataField, value: i64) -> Self {
        self.metadata.insert(field, value);
        self
    }

    pub fn supports_metadata(&self, field: MetadataField) -> bool {
        self.metadata.contains_key(&field)
    }

    pub fn metadata(&self, field: MetadataField) -> Option<i64> {
        self.metadata.get(&field).copied()
    }
}

/// Callback invoked on the device's delivery thread for every frame
pub type FrameCallback = Box<dyn FnMut(Frame) + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time_from_fps() {
        let profile = StreamProfile {
            stream: StreamType::Depth,
            format: PixelFormat::Z16,
            width: 848,
            height: 480,
            fps: 30,
        };

        assert!((profile.frame_time_ms() - 33.333).abs() < 0.001);
        assert!((profile.frame_time_us() - 33_333.333).abs() < 0.01);
    }

    #[test]
    fn test_option_range_clamp() {
        let range = OptionRange { min: 1.0, max: 165_000.0, step: 1.0, default: 8500.0 };

        assert_eq!(range.clamp(200_000.0), 165_000.0);
        assert_eq!(range.clamp(0.0), 1.0);
        assert!(range.contains(66_666.0));
    }

    #[test]
    fn test_metadata_lookup() {
        let frame = Frame::new(StreamType::Depth, 7).with_metadata(MetadataField::AutoExposure, 1);

        assert!(frame.supports_metadata(MetadataField::AutoExposure));
        assert!(!frame.supports_metadata(MetadataField::ActualExposure));
        assert_eq!(frame.metadata(MetadataField::AutoExposure), Some(1));
    }

    #[test]
    fn test_ae_mode_values() {
        assert_eq!(AutoExposureMode::from_value(1.0), Some(AutoExposureMode::Accelerated));
        assert_eq!(AutoExposureMode::Regular.as_value(), 0.0);
        assert_eq!(AutoExposureMode::from_value(5.0), None);
    }
}
