use super::*;
use crate::config::{CaptureBackendKind, CaptureConfig};
use crate::error::CaptureError;
use crate::frame::FrameFormat;

fn create_test_capture_config() -> CaptureConfig {
    CaptureConfig {
        backend: CaptureBackendKind::Synthetic,
        synthetic_fps: 50,
        synthetic_width: 8,
        synthetic_height: 6,
    }
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_source_produces_frames() {
    let backend = SyntheticBackend::new(50, 8, 6);
    let cam = CameraConfig::usb("cam_1", "Desk", 0);

    let mut source = backend.open(&cam).await.unwrap();

    let first = source.read_frame().await.unwrap();
    let second = source.read_frame().await.unwrap();

    assert_eq!(first.sequence, 0);
    assert_eq!(second.sequence, 1);
    assert_eq!(first.format, FrameFormat::Rgb24);
    assert_eq!((first.width, first.height), (8, 6));
    assert_eq!(first.data.len(), 8 * 6 * 3);
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_source_paces_reads() {
    let backend = SyntheticBackend::new(10, 4, 4);
    let cam = CameraConfig::usb("cam_1", "Desk", 0);
    let mut source = backend.open(&cam).await.unwrap();

    // The first tick completes immediately
    source.read_frame().await.unwrap();
    let started = tokio::time::Instant::now();
    source.read_frame().await.unwrap();

    assert!(started.elapsed() >= std::time::Duration::from_millis(100));
}

#[tokio::test]
async fn test_synthetic_source_rejects_bad_sources() {
    let backend = SyntheticBackend::default();

    let mut bad_usb = CameraConfig::usb("cam_1", "Desk", 0);
    bad_usb.source = "front-door".to_string();
    let result = backend.open(&bad_usb).await;
    assert!(matches!(result, Err(CaptureError::OpenFailed { .. })));

    let bad_rtsp = CameraConfig::rtsp("cam_2", "Yard", "http://10.0.0.2/stream");
    let result = backend.open(&bad_rtsp).await;
    assert!(matches!(result, Err(CaptureError::OpenFailed { .. })));

    let good_rtsp = CameraConfig::rtsp("cam_3", "Gate", "rtsps://10.0.0.3/stream");
    assert!(backend.open(&good_rtsp).await.is_ok());
}

#[tokio::test]
async fn test_released_source_fails_reads() {
    let backend = SyntheticBackend::new(30, 4, 4);
    let cam = CameraConfig::usb("cam_1", "Desk", 0);
    let mut source = backend.open(&cam).await.unwrap();

    source.release();
    source.release();

    assert!(matches!(
        source.read_frame().await,
        Err(CaptureError::ReadFailed { .. })
    ));
}

#[test]
fn test_backend_from_config() {
    let backend = backend_from_config(&create_test_capture_config()).unwrap();
    assert_eq!(backend.name(), "synthetic");
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
#[test]
fn test_gstreamer_backend_requires_feature() {
    let mut config = create_test_capture_config();
    config.backend = CaptureBackendKind::Gstreamer;

    match backend_from_config(&config) {
        Err(crate::error::CamvisorError::System { message }) => {
            assert!(message.contains("camera"));
        }
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Expected missing feature error"),
    }
}
