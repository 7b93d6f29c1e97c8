mod json;
mod validate;

pub use json::{JsonRegistry, REGISTRY_VERSION};
pub use validate::{
    validate_camera, MAX_FPS_LIMIT, MAX_RETENTION_DAYS, MIN_FACE_PX, MIN_FPS_LIMIT,
};

use crate::camera::CameraConfig;
use crate::error::Result;

/// Source of camera definitions for the manager.
///
/// Implementations must be safe to call from any task; the manager calls
/// `get` and `list` without holding its own lock.
pub trait CameraRegistry: Send + Sync {
    fn get(&self, camera_id: &str) -> Option<CameraConfig>;

    /// Cameras ordered by id, optionally including disabled ones
    fn list(&self, include_disabled: bool) -> Vec<CameraConfig>;

    /// Refresh from the backing store
    fn reload(&self) -> Result<()>;
}
