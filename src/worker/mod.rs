mod reporter;
mod run_loop;
mod throttle;

pub use reporter::{FrameCallback, HealthCallback};
pub use throttle::{FpsWindow, FrameThrottle};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::camera::{CameraConfig, CaptureBackend};
use crate::config::WorkerConfig;
use crate::health::{WorkerHealth, WorkerState};
use crate::recovery::BackoffConfig;
use reporter::HealthReporter;
use run_loop::RunLoop;

/// Timing knobs shared by every worker a manager creates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerSettings {
    pub backoff: BackoffConfig,
    pub stop_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            backoff: config.backoff(),
            stop_timeout: config.stop_timeout(),
        }
    }
}

/// Optional sinks attached to a worker
#[derive(Clone, Default)]
pub struct WorkerCallbacks {
    pub on_frame: Option<FrameCallback>,
    pub on_health: Option<HealthCallback>,
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Clears the alive marker when a run's task ends, including by panic
struct AliveGuard {
    alive: Arc<AtomicU64>,
    generation: u64,
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        let _ = self.alive.compare_exchange(
            self.generation,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Supervises capture for a single camera.
///
/// Each `start` launches a background task that opens the camera, reads
/// frames, throttles them to the camera's fps limit and hands them to the
/// frame sink. Capture failures never end the task; it reconnects with
/// backoff until stopped.
pub struct CameraWorker {
    config: Arc<CameraConfig>,
    backend: Arc<dyn CaptureBackend>,
    on_frame: Option<FrameCallback>,
    settings: WorkerSettings,
    reporter: Arc<HealthReporter>,
    run: Mutex<Option<RunHandle>>,
    /// Generation of the run whose task is executing, or 0
    alive: Arc<AtomicU64>,
    started: AtomicBool,
}

impl CameraWorker {
    pub fn new(
        config: Arc<CameraConfig>,
        backend: Arc<dyn CaptureBackend>,
        callbacks: WorkerCallbacks,
        settings: WorkerSettings,
    ) -> Self {
        let reporter = Arc::new(HealthReporter::new(&config.id, callbacks.on_health));
        Self {
            config,
            backend,
            on_frame: callbacks.on_frame,
            settings,
            reporter,
            run: Mutex::new(None),
            alive: Arc::new(AtomicU64::new(0)),
            started: AtomicBool::new(false),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn settings(&self) -> WorkerSettings {
        self.settings
    }

    /// Launch the capture loop. No-op while a run is already active.
    ///
    /// Must be called from within a tokio runtime. STARTING is published
    /// before this returns.
    pub fn start(&self) {
        let mut run = self.run.lock();
        if let Some(active) = run.as_ref() {
            if !active.token.is_cancelled() && !active.task.is_finished() {
                debug!("Worker for camera {} already running", self.config.id);
                return;
            }
        }

        let generation = self.reporter.begin_run();
        let token = CancellationToken::new();
        let run_loop = RunLoop::new(
            Arc::clone(&self.config),
            Arc::clone(&self.backend),
            self.on_frame.clone(),
            Arc::clone(&self.reporter),
            generation,
            token.clone(),
            self.settings.backoff,
        );

        self.alive.store(generation, Ordering::SeqCst);
        let guard = AliveGuard {
            alive: Arc::clone(&self.alive),
            generation,
        };
        let task = tokio::spawn(async move {
            let _guard = guard;
            run_loop.run().await;
        });

        *run = Some(RunHandle { token, task });
        self.started.store(true, Ordering::SeqCst);
        info!("Worker for camera {} started", self.config.id);
    }

    /// Signal the loop and wait up to `wait` for it to exit.
    ///
    /// A loop that does not exit in time is detached and left to finish on
    /// its own; its later health updates are ignored. Health ends STOPPED
    /// either way.
    pub async fn stop(&self, wait: Duration) {
        let handle = self.run.lock().take();

        if let Some(RunHandle { token, task }) = handle {
            token.cancel();
            match timeout(wait, task).await {
                Ok(Ok(())) => {
                    debug!("Worker loop for camera {} joined", self.config.id);
                }
                Ok(Err(e)) => {
                    error!("Worker task for camera {} failed: {}", self.config.id, e);
                }
                Err(_) => {
                    warn!(
                        "Worker for camera {} did not exit within {:?}; abandoning it",
                        self.config.id, wait
                    );
                }
            }
        }

        self.reporter.update(|h| h.state = WorkerState::Stopped);
        info!("Worker for camera {} stopped", self.config.id);
    }

    /// Stop with the configured timeout, then start a fresh run.
    ///
    /// Counters and backoff start over.
    pub async fn restart(&self) {
        self.stop(self.settings.stop_timeout).await;
        self.start();
    }

    /// True while a run's task is executing, including one that was
    /// abandoned by `stop` and has not exited yet
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) != 0
    }

    /// True once `start` has been called at least once
    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> WorkerHealth {
        self.reporter.snapshot()
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.run.get_mut().take() {
            handle.token.cancel();
        }
    }
}
