mod reconcile;
#[cfg(test)]
mod tests;

pub use reconcile::ReconcileReport;

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::camera::{CameraConfig, CaptureBackend};
use crate::error::{CamvisorError, Result};
use crate::health::{ManagerSnapshot, WorkerHealth};
use crate::registry::CameraRegistry;
use crate::worker::{
    CameraWorker, FrameCallback, HealthCallback, WorkerCallbacks, WorkerSettings,
};

struct WorkerEntry {
    instance: u64,
    worker: Arc<CameraWorker>,
}

impl WorkerEntry {
    /// Live means running, or created but not yet started by its caller
    fn is_live(&self) -> bool {
        !self.worker.was_started() || self.worker.is_alive()
    }
}

#[derive(Default)]
struct ManagerState {
    workers: HashMap<String, WorkerEntry>,
    health: HashMap<String, WorkerHealth>,
    next_instance: u64,
}

/// Owns one worker per active camera and keeps them in line with the
/// registry.
///
/// The worker map and the health cache share one lock. It is only held for
/// map operations; starting and stopping workers happens after releasing it.
pub struct CameraManager {
    registry: Arc<dyn CameraRegistry>,
    backend: Arc<dyn CaptureBackend>,
    settings: WorkerSettings,
    on_frame: Option<FrameCallback>,
    on_health: Option<HealthCallback>,
    state: Arc<Mutex<ManagerState>>,
}

impl CameraManager {
    pub fn builder() -> CameraManagerBuilder {
        CameraManagerBuilder::new()
    }

    pub fn registry(&self) -> &Arc<dyn CameraRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> WorkerSettings {
        self.settings
    }

    /// Start the worker for `camera_id` unless one is already live
    pub async fn start(&self, camera_id: &str) -> Result<()> {
        self.start_worker(camera_id).map(|_| ())
    }

    /// Stop and forget the worker for `camera_id`. Returns false if none
    /// was tracked.
    pub async fn stop(&self, camera_id: &str) -> bool {
        let entry = self.state.lock().workers.remove(camera_id);
        match entry {
            Some(entry) => {
                entry.worker.stop(self.settings.stop_timeout).await;
                true
            }
            None => {
                debug!("No worker tracked for camera {}", camera_id);
                false
            }
        }
    }

    /// Replace the worker with a fresh one built from the current registry
    /// entry. Counters start over.
    pub async fn restart(&self, camera_id: &str) -> Result<()> {
        self.require_config(camera_id)?;
        self.stop(camera_id).await;
        self.start(camera_id).await
    }

    /// Start every enabled camera. Failures are logged and skipped.
    pub async fn start_all_enabled(&self) -> usize {
        let mut started = 0;
        for camera in self.registry.list(false) {
            match self.start_worker(&camera.id) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to start camera {}: {}", camera.id, e),
            }
        }
        info!("Started {} camera workers", started);
        started
    }

    /// Stop every tracked worker concurrently
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<String> = self.state.lock().workers.keys().cloned().collect();
        let results = join_all(ids.iter().map(|id| self.stop(id))).await;
        let stopped = results.into_iter().filter(|stopped| *stopped).count();
        info!("Stopped {} camera workers", stopped);
        stopped
    }

    pub async fn reload_registry(&self) -> Result<()> {
        self.registry.reload()
    }

    pub fn get_health(&self, camera_id: &str) -> Option<WorkerHealth> {
        self.state.lock().health.get(camera_id).cloned()
    }

    /// Cached health of every camera, ordered by id
    pub fn list_health(&self) -> Vec<WorkerHealth> {
        let mut health: Vec<WorkerHealth> = self.state.lock().health.values().cloned().collect();
        health.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        health
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let state = self.state.lock();
        ManagerSnapshot::from_health(state.health.values())
    }

    /// Ids with a live worker, ordered
    pub fn live_camera_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .workers
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn require_config(&self, camera_id: &str) -> Result<CameraConfig> {
        self.registry
            .get(camera_id)
            .ok_or_else(|| CamvisorError::camera_not_found(camera_id))
    }

    /// Returns true if a new worker was launched
    fn start_worker(&self, camera_id: &str) -> Result<bool> {
        let config = Arc::new(self.require_config(camera_id)?);

        let worker = {
            let mut state = self.state.lock();
            if let Some(entry) = state.workers.get(camera_id) {
                if entry.is_live() {
                    debug!("Camera {} already has a live worker", camera_id);
                    return Ok(false);
                }
            }

            state.next_instance += 1;
            let instance = state.next_instance;
            let worker = Arc::new(self.build_worker(config, instance));
            state.workers.insert(
                camera_id.to_string(),
                WorkerEntry {
                    instance,
                    worker: Arc::clone(&worker),
                },
            );
            worker
        };

        worker.start();
        Ok(true)
    }

    fn build_worker(&self, config: Arc<CameraConfig>, instance: u64) -> CameraWorker {
        let callbacks = WorkerCallbacks {
            on_frame: self.on_frame.clone(),
            on_health: Some(caching_health_sink(
                Arc::downgrade(&self.state),
                instance,
                self.on_health.clone(),
            )),
        };
        CameraWorker::new(config, Arc::clone(&self.backend), callbacks, self.settings)
    }
}

/// Wrap the external health sink so every report lands in the cache first.
///
/// Reports from a worker that has been replaced for the same camera are
/// dropped, so a late STOPPED from an old worker cannot mask the new one.
fn caching_health_sink(
    state: Weak<Mutex<ManagerState>>,
    instance: u64,
    forward: Option<HealthCallback>,
) -> HealthCallback {
    Arc::new(move |health: WorkerHealth| {
        let Some(state) = state.upgrade() else {
            return Ok(());
        };

        {
            let mut state = state.lock();
            let current = state
                .workers
                .get(&health.camera_id)
                .map(|entry| entry.instance);
            if matches!(current, Some(current) if current != instance) {
                return Ok(());
            }
            state
                .health
                .insert(health.camera_id.clone(), health.clone());
        }

        match &forward {
            Some(forward) => forward(health),
            None => Ok(()),
        }
    })
}

/// Builder for [`CameraManager`]
pub struct CameraManagerBuilder {
    registry: Option<Arc<dyn CameraRegistry>>,
    backend: Option<Arc<dyn CaptureBackend>>,
    settings: WorkerSettings,
    on_frame: Option<FrameCallback>,
    on_health: Option<HealthCallback>,
}

impl CameraManagerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            backend: None,
            settings: WorkerSettings::default(),
            on_frame: None,
            on_health: None,
        }
    }

    pub fn registry(mut self, registry: Arc<dyn CameraRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CaptureBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn on_frame(mut self, on_frame: FrameCallback) -> Self {
        self.on_frame = Some(on_frame);
        self
    }

    pub fn on_health(mut self, on_health: HealthCallback) -> Self {
        self.on_health = Some(on_health);
        self
    }

    pub fn build(self) -> Result<CameraManager> {
        let registry = self
            .registry
            .ok_or_else(|| CamvisorError::system("Camera registry must be specified"))?;
        let backend = self
            .backend
            .ok_or_else(|| CamvisorError::system("Capture backend must be specified"))?;

        Ok(CameraManager {
            registry,
            backend,
            settings: self.settings,
            on_frame: self.on_frame,
            on_health: self.on_health,
            state: Arc::new(Mutex::new(ManagerState::default())),
        })
    }
}

impl Default for CameraManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
