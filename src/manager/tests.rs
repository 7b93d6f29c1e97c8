use super::*;
use crate::camera::{CameraPatch, CaptureSource, SyntheticBackend};
use crate::error::{CaptureError, SinkError};
use crate::frame::{FrameData, FrameMetadata};
use crate::health::WorkerState;
use crate::registry::JsonRegistry;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Synthetic capture that refuses to open selected cameras
struct TestBackend {
    inner: SyntheticBackend,
    failing: Vec<String>,
    opens: AtomicUsize,
}

impl TestBackend {
    fn new(failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inner: SyntheticBackend::new(30, 4, 4),
            failing: failing.iter().map(|id| id.to_string()).collect(),
            opens: AtomicUsize::new(0),
        })
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for TestBackend {
    async fn open(
        &self,
        camera: &CameraConfig,
    ) -> std::result::Result<Box<dyn CaptureSource>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&camera.id) {
            return Err(CaptureError::open_failed(&camera.source, "device busy"));
        }
        self.inner.open(camera).await
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

fn create_test_registry() -> Arc<JsonRegistry> {
    let registry = Arc::new(JsonRegistry::in_memory());
    registry
        .add(CameraConfig::usb("cam_1", "Desk", 0).with_fps_limit(5))
        .unwrap();
    registry
        .add(CameraConfig::rtsp("cam_2", "Yard", "rtsp://10.0.0.2/stream").with_enabled(false))
        .unwrap();
    registry
}

fn create_test_manager(registry: Arc<JsonRegistry>, backend: Arc<TestBackend>) -> CameraManager {
    CameraManager::builder()
        .registry(registry)
        .backend(backend)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_enable_disable_delete_lifecycle() {
    let registry = create_test_registry();
    let manager = create_test_manager(registry.clone(), TestBackend::new(&[]));

    assert_eq!(manager.start_all_enabled().await, 1);
    assert_eq!(manager.live_camera_ids(), vec!["cam_1"]);

    sleep(Duration::from_millis(500)).await;
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.total, 1);
    assert_eq!(snapshot.running, 1);

    registry.disable("cam_1").unwrap();
    let report = manager.apply_registry_state().await;
    assert_eq!(report.stopped, vec!["cam_1"]);
    assert!(report.started.is_empty());
    assert!(manager.live_camera_ids().is_empty());

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.running, 0);
    assert_eq!(snapshot.stopped, 1);
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Stopped
    );

    // Still known to the registry, so the entry stays
    let report = manager.apply_registry_state().await;
    assert!(report.is_empty());
    assert!(manager.get_health("cam_1").is_some());

    registry.delete("cam_1").unwrap();
    let report = manager.apply_registry_state().await;
    assert_eq!(report.pruned, vec!["cam_1"]);
    assert!(manager.get_health("cam_1").is_none());
    assert_eq!(manager.snapshot().total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_is_idempotent() {
    let registry = create_test_registry();
    registry.enable("cam_2").unwrap();
    let backend = TestBackend::new(&[]);
    let manager = create_test_manager(registry, backend.clone());

    let first = manager.apply_registry_state().await;
    assert_eq!(first.started, vec!["cam_1", "cam_2"]);

    sleep(Duration::from_millis(200)).await;
    let second = manager.apply_registry_state().await;
    assert!(second.is_empty(), "unexpected changes: {}", second);
    assert_eq!(backend.opens(), 2);

    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_live_workers_match_enabled_set() {
    let registry = create_test_registry();
    registry
        .add(CameraConfig::usb("cam_3", "Garage", 2))
        .unwrap();
    let manager = create_test_manager(registry.clone(), TestBackend::new(&[]));

    manager.start_all_enabled().await;
    // A manually started camera that is not enabled gets stopped
    manager.start("cam_2").await.unwrap();
    assert_eq!(manager.live_camera_ids(), vec!["cam_1", "cam_2", "cam_3"]);

    registry.disable("cam_3").unwrap();
    manager.apply_registry_state().await;

    let enabled: Vec<String> = registry.list(false).into_iter().map(|c| c.id).collect();
    assert_eq!(manager.live_camera_ids(), enabled);

    manager.stop_all().await;
}

#[tokio::test]
async fn test_unknown_camera_is_not_found() {
    let manager = create_test_manager(create_test_registry(), TestBackend::new(&[]));

    let result = manager.start("cam_404").await;
    assert!(matches!(result, Err(CamvisorError::CameraNotFound { .. })));

    let result = manager.restart("cam_404").await;
    assert!(matches!(result, Err(CamvisorError::CameraNotFound { .. })));

    assert!(!manager.stop("cam_404").await);
    assert!(manager.get_health("cam_404").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_reports_stopped() {
    let manager = create_test_manager(create_test_registry(), TestBackend::new(&[]));

    manager.start("cam_1").await.unwrap();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Running
    );

    assert!(manager.stop("cam_1").await);
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Stopped
    );
    assert!(!manager.stop("cam_1").await);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let backend = TestBackend::new(&[]);
    let manager = create_test_manager(create_test_registry(), backend.clone());

    manager.start("cam_1").await.unwrap();
    manager.start("cam_1").await.unwrap();
    assert_eq!(manager.start_all_enabled().await, 0);
    sleep(Duration::from_millis(200)).await;

    assert_eq!(backend.opens(), 1);
    assert_eq!(manager.live_camera_ids(), vec!["cam_1"]);
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_applies_new_config_and_resets_counters() {
    let registry = create_test_registry();
    let manager = create_test_manager(registry.clone(), TestBackend::new(&[]));

    manager.start("cam_1").await.unwrap();
    sleep(Duration::from_secs(2)).await;
    // The cache holds the last published value, at most one fps window old
    assert!(manager.get_health("cam_1").unwrap().frames_total >= 5);

    registry
        .update(
            "cam_1",
            &CameraPatch {
                fps_limit: Some(2),
                ..CameraPatch::default()
            },
        )
        .unwrap();
    manager.restart("cam_1").await.unwrap();

    let health = manager.get_health("cam_1").unwrap();
    assert_eq!(health.state, WorkerState::Starting);
    assert_eq!(health.frames_total, 0);

    sleep(Duration::from_secs(2)).await;
    let frames = manager.get_health("cam_1").unwrap().frames_total;
    assert!((3..=5).contains(&frames), "emitted {} frames at 2 fps", frames);

    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_camera_does_not_affect_others() {
    let registry = create_test_registry();
    registry.enable("cam_2").unwrap();
    let manager = create_test_manager(registry, TestBackend::new(&["cam_2"]));

    assert_eq!(manager.start_all_enabled().await, 2);
    sleep(Duration::from_secs(5)).await;

    let health = manager.list_health();
    assert_eq!(health.len(), 2);
    assert_eq!(health[0].camera_id, "cam_1");
    assert_eq!(health[0].state, WorkerState::Running);
    assert!(matches!(
        health[1].state,
        WorkerState::Degraded | WorkerState::Error
    ));
    assert!(health[1].last_error.as_ref().unwrap().contains("device busy"));

    // Both workers keep running; the failing one keeps retrying
    assert_eq!(manager.live_camera_ids(), vec!["cam_1", "cam_2"]);
    assert_eq!(manager.stop_all().await, 2);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.stopped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_sinks_receive_frames_and_health() {
    let frames = Arc::new(AtomicUsize::new(0));
    let states = Arc::new(Mutex::new(Vec::new()));

    let frame_count = Arc::clone(&frames);
    let on_frame: FrameCallback = Arc::new(move |camera_id: &str, _frame: &FrameData, metadata: &FrameMetadata| {
        assert_eq!(camera_id, "cam_1");
        assert_eq!(metadata.camera_name, "Desk");
        frame_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let seen = Arc::clone(&states);
    let on_health: HealthCallback = Arc::new(move |health: WorkerHealth| {
        seen.lock().push(health.state);
        Err(SinkError::new("dashboard offline"))
    });

    let manager = CameraManager::builder()
        .registry(create_test_registry())
        .backend(TestBackend::new(&[]))
        .on_frame(on_frame)
        .on_health(on_health)
        .build()
        .unwrap();

    manager.start("cam_1").await.unwrap();
    sleep(Duration::from_secs(1)).await;
    manager.stop("cam_1").await;

    assert!(frames.load(Ordering::SeqCst) >= 4);
    let states = states.lock().clone();
    assert_eq!(states.first(), Some(&WorkerState::Starting));
    assert!(states.contains(&WorkerState::Running));
    assert_eq!(states.last(), Some(&WorkerState::Stopped));
    // A failing external sink does not affect the cache
    assert_eq!(
        manager.get_health("cam_1").unwrap().state,
        WorkerState::Stopped
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_and_reconcile() {
    let backend = TestBackend::new(&[]);
    let manager = Arc::new(create_test_manager(create_test_registry(), backend.clone()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                manager.start("cam_1").await.unwrap();
            } else {
                manager.apply_registry_state().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.live_camera_ids(), vec!["cam_1"]);
    assert_eq!(backend.opens(), 1);

    manager.stop_all().await;
    assert!(manager.live_camera_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reload_picks_up_new_cameras() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cameras.json");
    let registry = Arc::new(JsonRegistry::open(&path).unwrap());
    let manager = create_test_manager(registry, TestBackend::new(&[]));

    assert!(manager.apply_registry_state().await.is_empty());

    let editor = JsonRegistry::open(&path).unwrap();
    editor.add(CameraConfig::usb("cam_7", "Attic", 1)).unwrap();

    manager.reload_registry().await.unwrap();
    let report = manager.apply_registry_state().await;
    assert_eq!(report.started, vec!["cam_7"]);

    manager.stop_all().await;
}

#[test]
fn test_builder_requires_registry_and_backend() {
    let result = CameraManager::builder()
        .backend(TestBackend::new(&[]))
        .build();
    assert!(matches!(result, Err(CamvisorError::System { .. })));

    let result = CameraManager::builder()
        .registry(create_test_registry())
        .build();
    assert!(matches!(result, Err(CamvisorError::System { .. })));
}

#[test]
fn test_cache_ignores_reports_from_replaced_worker() {
    let state = Arc::new(Mutex::new(ManagerState::default()));
    let forwarded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&forwarded);
    let forward: HealthCallback = Arc::new(move |h: WorkerHealth| {
        sink.lock().push(h.state);
        Ok(())
    });

    let old_sink = caching_health_sink(Arc::downgrade(&state), 1, Some(forward.clone()));
    let new_sink = caching_health_sink(Arc::downgrade(&state), 2, Some(forward));

    let replacement = CameraWorker::new(
        Arc::new(CameraConfig::usb("cam_1", "Desk", 0)),
        Arc::new(SyntheticBackend::default()),
        WorkerCallbacks::default(),
        WorkerSettings::default(),
    );
    state.lock().workers.insert(
        "cam_1".to_string(),
        WorkerEntry {
            instance: 2,
            worker: Arc::new(replacement),
        },
    );

    let mut report = WorkerHealth::new("cam_1");
    report.state = WorkerState::Running;
    new_sink(report.clone()).unwrap();

    // Late STOPPED from the worker that was replaced
    report.state = WorkerState::Stopped;
    old_sink(report.clone()).unwrap();

    assert_eq!(state.lock().health["cam_1"].state, WorkerState::Running);
    assert_eq!(*forwarded.lock(), vec![WorkerState::Running]);

    // Once untracked, any worker's final report is taken
    state.lock().workers.remove("cam_1");
    old_sink(report).unwrap();
    assert_eq!(state.lock().health["cam_1"].state, WorkerState::Stopped);
}
