use aeharness::hal::mock::{SimulatedCamera, SimulatedCameraConfig};
use aeharness::hal::{
    Device, DeviceOption, Frame, MetadataField, PixelFormat, StreamProfile, StreamType,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

fn fast_profile() -> StreamProfile {
    StreamProfile {
        stream: StreamType::Depth,
        format: PixelFormat::Z16,
        width: 848,
        height: 480,
        fps: 100,
    }
}

fn fast_camera(config: SimulatedCameraConfig) -> SimulatedCamera {
    SimulatedCamera::with_config(SimulatedCameraConfig {
        profiles: vec![fast_profile()],
        ..config
    })
}

type Received = Arc<Mutex<Vec<Frame>>>;

async fn start_collecting(camera: &mut SimulatedCamera) -> Received {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    camera.open(&fast_profile()).await.unwrap();
    camera
        .start(Box::new(move |frame: Frame| sink.lock().unwrap().push(frame)))
        .await
        .unwrap();
    received
}

#[tokio::test]
async fn test_camera_lifecycle() {
    let mut camera = fast_camera(SimulatedCameraConfig::default());
    let received = start_collecting(&mut camera).await;
    assert!(camera.is_streaming());

    sleep(Duration::from_millis(100)).await;
    camera.stop().await.unwrap();
    camera.close().await.unwrap();

    let frames = received.lock().unwrap();
    assert!(!frames.is_empty());
    assert_eq!(frames.len() as u64, camera.frames_delivered());
    assert!(frames.windows(2).all(|pair| pair[1].frame_number == pair[0].frame_number + 1));
    assert!(frames[0].supports_metadata(MetadataField::AutoExposure));
}

#[tokio::test]
async fn test_second_stop_and_close_fail() {
    let mut camera = fast_camera(SimulatedCameraConfig::default());
    start_collecting(&mut camera).await;

    assert!(camera.close().await.is_err(), "close while streaming");
    camera.stop().await.unwrap();
    assert!(camera.stop().await.is_err());
    camera.close().await.unwrap();
    assert!(camera.close().await.is_err());
}

#[tokio::test]
async fn test_open_rejects_unknown_profile() {
    let mut camera = fast_camera(SimulatedCameraConfig::default());
    let profile = StreamProfile {
        fps: 45,
        ..fast_profile()
    };
    assert!(camera.open(&profile).await.is_err());
}

#[tokio::test]
async fn test_ae_change_reaches_metadata_after_lag() {
    let mut camera = fast_camera(SimulatedCameraConfig {
        metadata_lag_frames: 3,
        ..Default::default()
    });
    let received = start_collecting(&mut camera).await;
    sleep(Duration::from_millis(80)).await;

    let switched_at = received.lock().unwrap().len();
    camera.set_option(DeviceOption::EnableAutoExposure, 0.0).unwrap();
    sleep(Duration::from_millis(150)).await;
    camera.stop().await.unwrap();
    camera.close().await.unwrap();

    let frames = received.lock().unwrap();
    assert!(frames[..switched_at]
        .iter()
        .all(|f| f.metadata(MetadataField::AutoExposure) == Some(1)));
    // One in-flight frame plus the lag may still report the old state
    assert!(frames[switched_at + 6..]
        .iter()
        .all(|f| f.metadata(MetadataField::AutoExposure) == Some(0)));
}

#[tokio::test]
async fn test_long_manual_exposure_slows_stream() {
    let mut camera = fast_camera(SimulatedCameraConfig::default());
    camera.set_option(DeviceOption::Exposure, 50_000.0).unwrap();

    let received = start_collecting(&mut camera).await;
    sleep(Duration::from_millis(300)).await;
    camera.stop().await.unwrap();
    camera.close().await.unwrap();

    // 50ms frames instead of 10ms
    let frames = received.lock().unwrap().len();
    assert!(frames >= 2, "got {frames} frames");
    assert!(frames <= 8, "got {frames} frames");
}

#[tokio::test]
async fn test_dropout_and_stall() {
    let mut camera = SimulatedCamera::new();
    camera
        .configure(json!({
            "profiles": [{ "stream": "depth", "format": "z16", "width": 848, "height": 480, "fps": 100 }],
            "metadata_dropout_every": 2,
            "stall_after_frames": 6
        }))
        .unwrap();

    let received = start_collecting(&mut camera).await;
    sleep(Duration::from_millis(200)).await;
    assert!(camera.is_streaming());
    camera.stop().await.unwrap();
    camera.close().await.unwrap();

    let frames = received.lock().unwrap();
    assert_eq!(frames.len(), 6);
    assert!(frames[1].metadata(MetadataField::AutoExposure).is_none());
    assert!(frames[2].metadata(MetadataField::AutoExposure).is_some());
}

#[tokio::test]
async fn test_read_only_option_rejects_writes() {
    let camera = fast_camera(SimulatedCameraConfig {
        read_only_options: vec![DeviceOption::EnableAutoExposure],
        ..Default::default()
    });

    assert!(camera.set_option(DeviceOption::EnableAutoExposure, 0.0).is_err());
    assert_eq!(camera.get_option(DeviceOption::EnableAutoExposure).unwrap(), 1.0);
}

#[tokio::test]
async fn test_configure_rejected_while_open() {
    let mut camera = fast_camera(SimulatedCameraConfig::default());
    camera.open(&fast_profile()).await.unwrap();

    assert!(camera.configure(json!({ "name": "other" })).is_err());
    camera.close().await.unwrap();
}
