use super::types::ShutdownHandle;
use super::{CamvisorOrchestrator, ShutdownReason};
use crate::error::{CamvisorError, Result};
use tokio::signal;
use tracing::{error, info};

impl CamvisorOrchestrator {
    /// Run until a shutdown signal arrives, then shut down. Returns the
    /// process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("camvisor is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CamvisorError::system("Shutdown receiver already taken"))?;

        // Spawn signal handlers
        self.setup_signal_handlers(self.shutdown_handle());

        // Wait for shutdown signal
        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| CamvisorError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("camvisor shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_handle: ShutdownHandle) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_handle_sigterm = shutdown_handle.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    shutdown_handle_sigterm
                        .request(ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                shutdown_handle
                    .request(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}
