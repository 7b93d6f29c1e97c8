use std::sync::Arc;
use tracing::info;

use super::interface::CaptureBackend;
use super::synthetic::SyntheticBackend;
use crate::config::{CaptureBackendKind, CaptureConfig};
use crate::error::{CamvisorError, Result};

/// Build the capture backend selected in configuration
pub fn backend_from_config(config: &CaptureConfig) -> Result<Arc<dyn CaptureBackend>> {
    let backend: Arc<dyn CaptureBackend> = match config.backend {
        CaptureBackendKind::Synthetic => Arc::new(SyntheticBackend::new(
            config.synthetic_fps,
            config.synthetic_width,
            config.synthetic_height,
        )),
        CaptureBackendKind::Gstreamer => gstreamer_backend()?,
    };

    info!("Using {} capture backend", backend.name());
    Ok(backend)
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn gstreamer_backend() -> Result<Arc<dyn CaptureBackend>> {
    let backend = super::gst::GstreamerBackend::new()
        .map_err(|e| CamvisorError::system(e.to_string()))?;
    Ok(Arc::new(backend))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn gstreamer_backend() -> Result<Arc<dyn CaptureBackend>> {
    Err(CamvisorError::system(
        "GStreamer capture requires the `camera` feature on Linux",
    ))
}
