use super::CamvisorOrchestrator;
use crate::error::Result;
use crate::manager::CameraManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl CamvisorOrchestrator {
    /// Start every enabled camera and the periodic background tasks
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting camvisor");

        let started = self.manager.start_all_enabled().await;
        info!("{} cameras starting", started);

        let supervisor = &self.config.supervisor;
        if supervisor.reconcile_interval_secs > 0 {
            let task = tokio::spawn(reconcile_loop(
                Arc::clone(&self.manager),
                Duration::from_secs(supervisor.reconcile_interval_secs),
                self.cancellation_token.clone(),
            ));
            self.background_tasks.push(task);
        } else {
            info!("Periodic reconciliation disabled");
        }

        if supervisor.status_interval_secs > 0 {
            let task = tokio::spawn(status_loop(
                Arc::clone(&self.manager),
                Duration::from_secs(supervisor.status_interval_secs),
                self.cancellation_token.clone(),
            ));
            self.background_tasks.push(task);
        }

        Ok(())
    }
}

/// Reload the registry and reconcile workers every `period`
async fn reconcile_loop(manager: Arc<CameraManager>, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; startup already applied the registry
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = manager.reload_registry().await {
            warn!("Registry reload failed, keeping current cameras: {}", e);
            continue;
        }
        manager.apply_registry_state().await;
    }

    debug!("Reconcile loop stopped");
}

/// Log the camera status snapshot every `period`
async fn status_loop(manager: Arc<CameraManager>, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        info!("Camera status: {}", manager.snapshot());
        for health in manager.list_health() {
            debug!(
                camera_id = %health.camera_id,
                state = %health.state,
                fps = health.fps_estimate,
                frames = health.frames_total,
                dropped = health.dropped_total,
                "Camera health"
            );
        }
    }

    debug!("Status loop stopped");
}
