use super::sinks::{frame_trace_sink, logging_health_sink};
use super::types::{ShutdownHandle, ShutdownReason};
use crate::camera::{backend_from_config, CaptureBackend};
use crate::config::CamvisorConfig;
use crate::error::Result;
use crate::manager::CameraManager;
use crate::registry::{CameraRegistry, JsonRegistry};
use crate::worker::WorkerSettings;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator: owns the camera manager and the periodic
/// reconcile and status tasks
pub struct CamvisorOrchestrator {
    pub(super) config: CamvisorConfig,
    pub(super) manager: Arc<CameraManager>,

    // Lifecycle management
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) background_tasks: Vec<JoinHandle<()>>,
}

impl CamvisorOrchestrator {
    /// Create an orchestrator backed by the registry file and capture
    /// backend named in `config`
    pub async fn new(config: CamvisorConfig) -> Result<Self> {
        let registry = Arc::new(JsonRegistry::open(&config.registry.path)?);
        info!(
            "Camera registry {} holds {} cameras",
            config.registry.path.display(),
            registry.list(true).len()
        );

        let backend = backend_from_config(&config.capture)?;
        Self::with_components(config, registry, backend)
    }

    /// Create an orchestrator around an existing registry and backend
    pub fn with_components(
        config: CamvisorConfig,
        registry: Arc<dyn CameraRegistry>,
        backend: Arc<dyn CaptureBackend>,
    ) -> Result<Self> {
        let manager = CameraManager::builder()
            .registry(registry)
            .backend(backend)
            .settings(WorkerSettings::from(&config.worker))
            .on_frame(frame_trace_sink())
            .on_health(logging_health_sink())
            .build()?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            manager: Arc::new(manager),
            shutdown_handle: ShutdownHandle::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            background_tasks: Vec::new(),
        })
    }

    pub fn manager(&self) -> &Arc<CameraManager> {
        &self.manager
    }

    pub fn config(&self) -> &CamvisorConfig {
        &self.config
    }

    /// Handle for triggering shutdown while `run` is in progress
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }
}
