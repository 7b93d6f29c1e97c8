use crate::camera::{CameraConfig, CameraKind};
use crate::error::{CamvisorError, Result};

pub const MIN_FPS_LIMIT: u32 = 1;
pub const MAX_FPS_LIMIT: u32 = 60;
pub const MIN_FACE_PX: u32 = 40;
pub const MAX_RETENTION_DAYS: u32 = 365;

/// Check a camera definition before it is stored
pub fn validate_camera(camera: &CameraConfig) -> Result<()> {
    if camera.id.is_empty()
        || !camera
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CamvisorError::validation(format!(
            "Invalid camera id: {:?}",
            camera.id
        )));
    }

    if camera.name.trim().is_empty() {
        return Err(CamvisorError::validation("Camera name is required"));
    }

    if !(MIN_FPS_LIMIT..=MAX_FPS_LIMIT).contains(&camera.fps_limit) {
        return Err(CamvisorError::validation(format!(
            "fps_limit must be between {} and {}",
            MIN_FPS_LIMIT, MAX_FPS_LIMIT
        )));
    }

    let source = camera.source.trim();
    match camera.kind {
        CameraKind::Usb => {
            if source.is_empty() || !source.chars().all(|c| c.is_ascii_digit()) {
                return Err(CamvisorError::validation(format!(
                    "USB camera source must be a numeric index, got: {}",
                    camera.source
                )));
            }
        }
        CameraKind::Rtsp => {
            if !(source.starts_with("rtsp://") || source.starts_with("rtsps://")) {
                return Err(CamvisorError::validation(
                    "RTSP source must start with rtsp:// or rtsps://",
                ));
            }
        }
    }

    let detect = &camera.detect;
    if detect.yolo_every_n < 1 || detect.pose_every_n < 1 || detect.emotion_every_n < 1 {
        return Err(CamvisorError::validation("Detection intervals must be >= 1"));
    }
    if detect.min_face_px < MIN_FACE_PX {
        return Err(CamvisorError::validation(format!(
            "min_face_px must be >= {}",
            MIN_FACE_PX
        )));
    }

    if camera.recording.retention_days > MAX_RETENTION_DAYS {
        return Err(CamvisorError::validation(format!(
            "retention_days must be 0..={}",
            MAX_RETENTION_DAYS
        )));
    }

    Ok(())
}
