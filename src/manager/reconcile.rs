use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

use super::CameraManager;
use crate::error::CamvisorError;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub pruned: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.pruned.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "started={:?} stopped={:?} pruned={:?}",
            self.started, self.stopped, self.pruned
        )
    }
}

impl CameraManager {
    /// Bring running workers in line with the registry.
    ///
    /// Stops workers whose camera is no longer enabled, starts enabled
    /// cameras without a live worker and forgets health for cameras the
    /// registry no longer knows. Running it again without registry changes
    /// does nothing. Each camera is handled on its own; a concurrent manual
    /// start or stop only affects that camera.
    pub async fn apply_registry_state(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let enabled: BTreeSet<String> = self
            .registry
            .list(false)
            .into_iter()
            .map(|camera| camera.id)
            .collect();
        let known: BTreeSet<String> = self
            .registry
            .list(true)
            .into_iter()
            .map(|camera| camera.id)
            .collect();

        let mut tracked: Vec<String> = self.state.lock().workers.keys().cloned().collect();
        tracked.sort();
        for camera_id in tracked {
            if !enabled.contains(&camera_id) && self.stop(&camera_id).await {
                report.stopped.push(camera_id);
            }
        }

        for camera_id in &enabled {
            match self.start_worker(camera_id) {
                Ok(true) => report.started.push(camera_id.clone()),
                Ok(false) => {}
                Err(CamvisorError::CameraNotFound { .. }) => {
                    debug!("Camera {} disappeared during reconciliation", camera_id);
                }
                Err(e) => warn!("Failed to start camera {}: {}", camera_id, e),
            }
        }

        {
            let mut state = self.state.lock();
            let stale: Vec<String> = state
                .health
                .keys()
                .filter(|id| !known.contains(*id) && !state.workers.contains_key(*id))
                .cloned()
                .collect();
            for camera_id in stale {
                state.health.remove(&camera_id);
                report.pruned.push(camera_id);
            }
        }
        report.pruned.sort();

        if report.is_empty() {
            debug!("Reconciliation found nothing to change");
        } else {
            info!("Reconciled cameras: {}", report);
        }
        report
    }
}
