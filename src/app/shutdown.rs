use super::CamvisorOrchestrator;
use crate::error::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// How long background tasks get to notice cancellation
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl CamvisorOrchestrator {
    /// Stop background tasks, then every camera worker.
    ///
    /// Returns exit code 1 if the workers did not all stop within the
    /// configured shutdown timeout.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();
        for task in self.background_tasks.drain(..) {
            match timeout(BACKGROUND_STOP_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Background task failed: {}", e),
                Err(_) => warn!("Background task did not stop in time"),
            }
        }

        let mut exit_code = 0;
        let limit = Duration::from_secs(self.config.supervisor.shutdown_timeout_secs);

        info!("Stopping camera workers");
        match timeout(limit, self.manager.stop_all()).await {
            Ok(stopped) => {
                info!("{} camera workers stopped", stopped);
            }
            Err(_) => {
                error!("Camera workers did not stop within {:?}", limit);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
