use async_trait::async_trait;

use super::types::CameraConfig;
use crate::error::CaptureError;
use crate::frame::FrameData;

/// An opened capture device.
///
/// Owned by exactly one worker loop. `read_frame` is the only call that may
/// block for long; the worker races it against its stop signal and drops the
/// pending read when stopping, so implementations must tolerate a read future
/// being dropped mid-flight.
#[async_trait]
pub trait CaptureSource: Send {
    /// Read the next frame from the device
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError>;

    /// Release the underlying device handle. Must be idempotent.
    fn release(&mut self);
}

/// Opens capture sources for camera definitions
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open(&self, camera: &CameraConfig) -> Result<Box<dyn CaptureSource>, CaptureError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
