use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::hal::{
    AutoExposureMode, Device, DeviceOption, Frame, FrameCallback, MetadataField, OptionRange,
    PixelFormat, StreamProfile, StreamType,
};

/// Behaviour knobs for [`SimulatedCamera`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedCameraConfig {
    pub name: String,

    pub profiles: Vec<StreamProfile>,

    /// Frames delivered after an AE change before the metadata reflects it
    pub metadata_lag_frames: u32,

    /// Every Nth frame is delivered without AE metadata
    pub metadata_dropout_every: Option<u64>,

    /// Stop delivering frames after this many (the stream stalls but stays "started")
    pub stall_after_frames: Option<u64>,

    /// Report this AE metadata value regardless of the control (firmware defect)
    pub stuck_ae_metadata: Option<i64>,

    /// Whether `auto_exposure_mode` is exposed
    pub supports_ae_mode: bool,

    /// Options that reject every write
    pub read_only_options: Vec<DeviceOption>,

    /// Manual exposure range in microseconds
    pub exposure_range: OptionRange,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            name: "Simulated Depth Camera".to_string(),
            profiles: default_profiles(),
            metadata_lag_frames: 2,
            metadata_dropout_every: None,
            stall_after_frames: None,
            stuck_ae_metadata: None,
            supports_ae_mode: true,
            read_only_options: Vec::new(),
            exposure_range: OptionRange {
                min: 1.0,
                max: 165_000.0,
                step: 1.0,
                default: 8_500.0,
            },
        }
    }
}

fn default_profiles() -> Vec<StreamProfile> {
    [6, 15, 30, 60, 90]
        .into_iter()
        .flat_map(|fps| {
            [PixelFormat::Z16, PixelFormat::Y8].into_iter().map(move |format| StreamProfile {
                stream: if format == PixelFormat::Z16 { StreamType::Depth } else { StreamType::Infrared },
                format,
                width: 848,
                height: 480,
                fps,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Controls {
    ae_enabled: bool,
    ae_mode: AutoExposureMode,
    exposure_us: f64,
}

/// In-process depth camera delivering frames on its own thread.
///
/// Manual exposures longer than the frame period slow the stream down to the
/// exposure time, and AE changes reach the frame metadata only after
/// `metadata_lag_frames` frames, like a real sensor settling.
pub struct SimulatedCamera {
    config: SimulatedCameraConfig,
    controls: Arc<Mutex<Controls>>,
    profile: Option<StreamProfile>,
    is_streaming: Arc<AtomicBool>,
    frames_delivered: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self::with_config(SimulatedCameraConfig::default())
    }

    pub fn with_config(config: SimulatedCameraConfig) -> Self {
        let controls = Controls {
            ae_enabled: true,
            ae_mode: AutoExposureMode::Regular,
            exposure_us: config.exposure_range.default,
        };

        Self {
            config,
            controls: Arc::new(Mutex::new(controls)),
            profile: None,
            is_streaming: Arc::new(AtomicBool::new(false)),
            frames_delivered: Arc::new(AtomicU64::new(0)),
            stop_tx: None,
            worker: None,
        }
    }

    /// Replace the configuration from JSON. Only allowed while closed.
    pub fn configure(&mut self, config: Value) -> Result<()> {
        if self.profile.is_some() {
            return Err(anyhow!("Cannot configure camera while it is open"));
        }
        let config: SimulatedCameraConfig =
            serde_json::from_value(config).context("Invalid simulated camera config")?;
        *self = Self::with_config(config);
        Ok(())
    }

    pub fn config(&self) -> &SimulatedCameraConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.profile.is_some()
    }

    /// Frames handed to callbacks since construction
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-stream settings copied into the delivery thread
struct Producer {
    profile: StreamProfile,
    controls: Arc<Mutex<Controls>>,
    delivered: Arc<AtomicU64>,
    lag_frames: u32,
    dropout_every: Option<u64>,
    stall_after: Option<u64>,
    stuck_metadata: Option<i64>,
}

impl Producer {
    fn run(self, stop_rx: crossbeam_channel::Receiver<()>, mut callback: FrameCallback) {
        let frame_period = Duration::from_secs_f64(self.profile.frame_time_ms() / 1000.0);

        let mut requested_ae = self.controls.lock().ae_enabled;
        let mut reported_ae = requested_ae;
        let mut lag_remaining = 0u32;
        let mut frame_number = 0u64;

        loop {
            let controls = *self.controls.lock();

            // Manual exposure longer than the frame period stretches the frame
            let period = if controls.ae_enabled {
                frame_period
            } else {
                frame_period.max(Duration::from_secs_f64(controls.exposure_us / 1_000_000.0))
            };

            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }

            if self.stall_after.is_some_and(|limit| frame_number >= limit) {
                continue;
            }

            if controls.ae_enabled != requested_ae {
                requested_ae = controls.ae_enabled;
                lag_remaining = self.lag_frames;
            }
            if lag_remaining > 0 {
                lag_remaining -= 1;
            } else {
                reported_ae = requested_ae;
            }

            let mut frame = Frame::new(self.profile.stream, frame_number)
                .with_metadata(MetadataField::FrameCounter, frame_number as i64);

            let dropped = self
                .dropout_every
                .is_some_and(|every| every > 0 && (frame_number + 1) % every == 0);
            if !dropped {
                let ae_value = self.stuck_metadata.unwrap_or(i64::from(reported_ae));
                frame = frame.with_metadata(MetadataField::AutoExposure, ae_value);
            }

            let actual_exposure = if reported_ae {
                self.profile.frame_time_us() / 4.0
            } else {
                controls.exposure_us
            };
            frame = frame.with_metadata(MetadataField::ActualExposure, actual_exposure as i64);

            callback(frame);
            self.delivered.fetch_add(1, Ordering::Relaxed);
            frame_number += 1;
        }
    }
}

#[async_trait]
impl Device for SimulatedCamera {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.config.profiles.clone()
    }

    async fn open(&mut self, profile: &StreamProfile) -> Result<()> {
        if self.profile.is_some() {
            return Err(anyhow!("Camera already open"));
        }
        if !self.config.profiles.contains(profile) {
            return Err(anyhow!("Unsupported stream profile {}", profile));
        }
        self.profile = Some(*profile);
        Ok(())
    }

    async fn start(&mut self, callback: FrameCallback) -> Result<()> {
        let profile = self.profile.ok_or_else(|| anyhow!("Camera not open"))?;
        if self.is_streaming() {
            return Err(anyhow!("Camera already streaming"));
        }

        let producer = Producer {
            profile,
            controls: Arc::clone(&self.controls),
            delivered: Arc::clone(&self.frames_delivered),
            lag_frames: self.config.metadata_lag_frames,
            dropout_every: self.config.metadata_dropout_every,
            stall_after: self.config.stall_after_frames,
            stuck_metadata: self.config.stuck_ae_metadata,
        };

        let (stop_tx, stop_rx) = bounded(1);
        let worker = std::thread::Builder::new()
            .name("simulated-camera".to_string())
            .spawn(move || producer.run(stop_rx, callback))
            .context("Failed to spawn camera delivery thread")?;

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        self.is_streaming.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let stop_tx = self
            .stop_tx
            .take()
            .ok_or_else(|| anyhow!("stop() called before start()"))?;
        // Dropping the sender also wakes the thread; the send only makes it prompt
        let _ = stop_tx.try_send(());
        drop(stop_tx);

        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await?
                .map_err(|_| anyhow!("Camera delivery thread panicked"))?;
        }

        self.is_streaming.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Err(anyhow!("close() called while streaming"));
        }
        self.profile
            .take()
            .map(|_| ())
            .ok_or_else(|| anyhow!("close() called on a closed camera"))
    }

    fn supports(&self, option: DeviceOption) -> bool {
        match option {
            DeviceOption::AutoExposureMode => self.config.supports_ae_mode,
            DeviceOption::EnableAutoExposure | DeviceOption::Exposure => true,
        }
    }

    fn option_range(&self, option: DeviceOption) -> Result<OptionRange> {
        if !self.supports(option) {
            return Err(anyhow!("Option {} not supported", option));
        }
        Ok(match option {
            DeviceOption::EnableAutoExposure => OptionRange { min: 0.0, max: 1.0, step: 1.0, default: 1.0 },
            DeviceOption::AutoExposureMode => OptionRange { min: 0.0, max: 1.0, step: 1.0, default: 0.0 },
            DeviceOption::Exposure => self.config.exposure_range,
        })
    }

    fn get_option(&self, option: DeviceOption) -> Result<f64> {
        if !self.supports(option) {
            return Err(anyhow!("Option {} not supported", option));
        }
        let controls = self.controls.lock();
        Ok(match option {
            DeviceOption::EnableAutoExposure => f64::from(u8::from(controls.ae_enabled)),
            DeviceOption::AutoExposureMode => controls.ae_mode.as_value(),
            DeviceOption::Exposure => controls.exposure_us,
        })
    }

    fn set_option(&self, option: DeviceOption, value: f64) -> Result<()> {
        let range = self.option_range(option)?;
        if self.config.read_only_options.contains(&option) {
            return Err(anyhow!("Option {} is read-only", option));
        }
        if !range.contains(value) {
            return Err(anyhow!(
                "Value {} out of range [{}, {}] for {}",
                value, range.min, range.max, option
            ));
        }

        let mut controls = self.controls.lock();
        match option {
            DeviceOption::EnableAutoExposure => controls.ae_enabled = value != 0.0,
            DeviceOption::AutoExposureMode => {
                controls.ae_mode = AutoExposureMode::from_value(value)
                    .ok_or_else(|| anyhow!("Unknown auto exposure mode {}", value))?;
            }
            DeviceOption::Exposure => {
                // Writing a manual exposure switches the sensor to manual mode
                controls.exposure_us = value;
                controls.ae_enabled = false;
            }
        }
        Ok(())
    }
}
