use super::*;
use crate::camera::{CameraConfig, CaptureBackend, CaptureSource, SyntheticBackend};
use crate::config::CamvisorConfig;
use crate::error::CaptureError;
use crate::frame::{FrameData, FrameFormat};
use crate::health::WorkerState;
use crate::registry::{CameraRegistry, JsonRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::sleep;

/// Capture whose reads block their thread for seconds, so the worker cannot
/// react to stop until the read returns
struct BlockingBackend;

struct BlockingSource;

#[async_trait]
impl CaptureBackend for BlockingBackend {
    async fn open(&self, _camera: &CameraConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
        Ok(Box::new(BlockingSource))
    }

    fn name(&self) -> &'static str {
        "blocking"
    }
}

#[async_trait]
impl CaptureSource for BlockingSource {
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError> {
        tokio::task::block_in_place(|| std::thread::sleep(Duration::from_secs(3)));
        Ok(FrameData::new(0, SystemTime::now(), vec![0; 3], 1, 1, FrameFormat::Rgb24))
    }

    fn release(&mut self) {}
}

fn create_test_config() -> CamvisorConfig {
    let mut config = CamvisorConfig::default();
    config.supervisor.reconcile_interval_secs = 1;
    config.supervisor.status_interval_secs = 1;
    config.supervisor.shutdown_timeout_secs = 5;
    config
}

fn create_test_orchestrator(config: CamvisorConfig) -> (CamvisorOrchestrator, Arc<JsonRegistry>) {
    let registry = Arc::new(JsonRegistry::in_memory());
    registry
        .add(CameraConfig::usb("cam_1", "Desk", 0).with_fps_limit(5))
        .unwrap();
    let orchestrator = CamvisorOrchestrator::with_components(
        config,
        registry.clone(),
        Arc::new(SyntheticBackend::new(15, 4, 4)),
    )
    .unwrap();
    (orchestrator, registry)
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_enabled_cameras() {
    let (mut orchestrator, _registry) = create_test_orchestrator(create_test_config());

    orchestrator.start().await.unwrap();
    sleep(Duration::from_millis(500)).await;

    let manager = orchestrator.manager();
    assert_eq!(manager.live_camera_ids(), vec!["cam_1"]);
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Running
    );

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_loop_follows_registry() {
    let (mut orchestrator, registry) = create_test_orchestrator(create_test_config());
    orchestrator.start().await.unwrap();

    registry
        .add(CameraConfig::rtsp("cam_2", "Yard", "rtsp://10.0.0.2/stream"))
        .unwrap();
    registry.disable("cam_1").unwrap();
    sleep(Duration::from_millis(1500)).await;

    let manager = orchestrator.manager();
    assert_eq!(manager.live_camera_ids(), vec!["cam_2"]);
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Stopped
    );

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_can_be_disabled() {
    let mut config = create_test_config();
    config.supervisor.reconcile_interval_secs = 0;
    let (mut orchestrator, registry) = create_test_orchestrator(config);
    orchestrator.start().await.unwrap();

    registry.disable("cam_1").unwrap();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(orchestrator.manager().live_camera_ids(), vec!["cam_1"]);
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_until_shutdown_request() {
    let (mut orchestrator, _registry) = create_test_orchestrator(create_test_config());
    orchestrator.start().await.unwrap();

    let handle = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        sleep(Duration::from_secs(2)).await;
        assert!(handle.request(ShutdownReason::UserRequest).await);
        assert!(!handle.request(ShutdownReason::UserRequest).await);
    });

    let exit_code = orchestrator.run().await.unwrap();

    assert_eq!(exit_code, 0);
    let manager = orchestrator.manager();
    assert!(manager.live_camera_ids().is_empty());
    assert_eq!(manager.snapshot().stopped, 1);

    // The receiver is consumed by the first run
    assert!(orchestrator.run().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_timeout_sets_exit_code() {
    let mut config = create_test_config();
    config.supervisor.shutdown_timeout_secs = 1;
    config.worker.stop_timeout_ms = 5000;

    let registry = Arc::new(JsonRegistry::in_memory());
    registry.add(CameraConfig::usb("cam_1", "Desk", 0)).unwrap();
    let mut orchestrator =
        CamvisorOrchestrator::with_components(config, registry, Arc::new(BlockingBackend))
            .unwrap();

    orchestrator.start().await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let started = std::time::Instant::now();
    assert_eq!(orchestrator.shutdown().await.unwrap(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_new_creates_registry_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = create_test_config();
    config.registry.path = dir.path().join("config").join("cameras.json");

    let orchestrator = CamvisorOrchestrator::new(config.clone()).await.unwrap();

    assert!(config.registry.path.exists());
    assert_eq!(orchestrator.manager().registry().list(true).len(), 0);
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
#[tokio::test]
async fn test_new_rejects_unavailable_backend() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = create_test_config();
    config.registry.path = dir.path().join("cameras.json");
    config.capture.backend = crate::config::CaptureBackendKind::Gstreamer;

    assert!(CamvisorOrchestrator::new(config).await.is_err());
}

#[test]
fn test_logging_health_sink_accepts_reports() {
    let sink = logging_health_sink();
    let mut health = crate::health::WorkerHealth::new("cam_1");

    for state in [
        WorkerState::Starting,
        WorkerState::Running,
        WorkerState::Running,
        WorkerState::Error,
        WorkerState::Stopped,
    ] {
        health.state = state;
        assert!(sink(health.clone()).is_ok());
    }
}
