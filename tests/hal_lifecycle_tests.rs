use aeharness::hal::mock::{SimulatedCamera, SimulatedCameraConfig};
use aeharness::hal::{
    Device, DeviceOption, FrameCallback, MetadataField, OptionRange, PixelFormat, SessionState,
    StreamProfile, StreamType, StreamingSession,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

fn profile() -> StreamProfile {
    StreamProfile {
        stream: StreamType::Depth,
        format: PixelFormat::Z16,
        width: 848,
        height: 480,
        fps: 100,
    }
}

/// Device whose stop and close always fail, counting the calls
struct FlakyDevice {
    stops: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

#[async_trait]
impl Device for FlakyDevice {
    fn name(&self) -> &str {
        "flaky"
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        vec![profile()]
    }

    async fn open(&mut self, _profile: &StreamProfile) -> Result<()> {
        Ok(())
    }

    async fn start(&mut self, _callback: FrameCallback) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("already stopped"))
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("already closed"))
    }

    fn supports(&self, _option: DeviceOption) -> bool {
        false
    }

    fn option_range(&self, option: DeviceOption) -> Result<OptionRange> {
        Err(anyhow!("{} not supported", option))
    }

    fn get_option(&self, option: DeviceOption) -> Result<f64> {
        Err(anyhow!("{} not supported", option))
    }

    fn set_option(&self, option: DeviceOption, _value: f64) -> Result<()> {
        Err(anyhow!("{} not supported", option))
    }
}

#[tokio::test]
async fn test_teardown_swallows_device_errors() {
    let stops = Arc::new(AtomicU32::new(0));
    let closes = Arc::new(AtomicU32::new(0));
    let mut device = FlakyDevice {
        stops: Arc::clone(&stops),
        closes: Arc::clone(&closes),
    };

    let mut session = StreamingSession::new(&mut device, profile());
    session.open().await.unwrap();
    session.start(MetadataField::AutoExposure).await.unwrap();

    session.teardown().await;
    assert_eq!(session.state(), SessionState::Closed);

    // Already closed: nothing reaches the device again
    session.teardown().await;
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_state_machine() {
    let mut camera = SimulatedCamera::with_config(SimulatedCameraConfig {
        profiles: vec![profile()],
        ..Default::default()
    });
    let mut session = StreamingSession::new(&mut camera, profile());

    assert!(session.start(MetadataField::AutoExposure).await.is_err());
    session.open().await.unwrap();
    assert!(session.open().await.is_err());

    let first = session.start(MetadataField::AutoExposure).await.unwrap();
    assert_eq!(session.state(), SessionState::Started);
    sleep(Duration::from_millis(60)).await;
    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    // Stopping twice stays quiet
    session.stop().await.unwrap();

    let second = session.start(MetadataField::AutoExposure).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second), "each start gets a fresh monitor");
    assert!(first.count() > 0);

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!camera.is_open());
}
