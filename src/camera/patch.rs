use serde::{Deserialize, Serialize};

use super::types::{CameraConfig, CameraKind, RecordingMode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectPatch {
    pub yolo_every_n: Option<u32>,
    pub pose_every_n: Option<u32>,
    pub emotion_every_n: Option<u32>,
    pub min_face_px: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyPatch {
    pub blur_faces: Option<bool>,
    pub blur_zones: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingPatch {
    pub mode: Option<RecordingMode>,
    pub retention_days: Option<u32>,
}

/// Partial update of a camera definition.
///
/// Every field is optional; `None` keeps the current value. Nested groups are
/// merged field by field, so patching `recording.mode` leaves
/// `recording.retention_days` alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<CameraKind>,
    pub source: Option<String>,
    pub enabled: Option<bool>,
    pub fps_limit: Option<u32>,
    pub detect: Option<DetectPatch>,
    pub privacy: Option<PrivacyPatch>,
    pub recording: Option<RecordingPatch>,
    pub zones: Option<Vec<serde_json::Value>>,
}

impl CameraPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Produce the patched copy of `base`; `base` itself is not touched
    pub fn apply(&self, base: &CameraConfig) -> CameraConfig {
        let mut cam = base.clone();

        if let Some(name) = &self.name {
            cam.name = name.clone();
        }
        if let Some(kind) = self.kind {
            cam.kind = kind;
        }
        if let Some(source) = &self.source {
            cam.source = source.clone();
        }
        if let Some(enabled) = self.enabled {
            cam.enabled = enabled;
        }
        if let Some(fps_limit) = self.fps_limit {
            cam.fps_limit = fps_limit;
        }

        if let Some(detect) = &self.detect {
            let d = &mut cam.detect;
            d.yolo_every_n = detect.yolo_every_n.unwrap_or(d.yolo_every_n);
            d.pose_every_n = detect.pose_every_n.unwrap_or(d.pose_every_n);
            d.emotion_every_n = detect.emotion_every_n.unwrap_or(d.emotion_every_n);
            d.min_face_px = detect.min_face_px.unwrap_or(d.min_face_px);
        }

        if let Some(privacy) = &self.privacy {
            if let Some(blur_faces) = privacy.blur_faces {
                cam.privacy.blur_faces = blur_faces;
            }
            if let Some(zones) = &privacy.blur_zones {
                cam.privacy.blur_zones = zones.clone();
            }
        }

        if let Some(recording) = &self.recording {
            let r = &mut cam.recording;
            r.mode = recording.mode.unwrap_or(r.mode);
            r.retention_days = recording.retention_days.unwrap_or(r.retention_days);
        }

        if let Some(zones) = &self.zones {
            cam.zones = zones.clone();
        }

        cam
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::RecordingConfig;

    #[test]
    fn test_empty_patch_is_identity() {
        let cam = CameraConfig::usb("cam_1", "Front", 0);
        let patch = CameraPatch::default();

        assert!(patch.is_empty());
        assert_eq!(patch.apply(&cam), cam);
    }

    #[test]
    fn test_nested_groups_merge_field_by_field() {
        let cam = CameraConfig::usb("cam_1", "Front", 0);
        let patch = CameraPatch {
            fps_limit: Some(10),
            recording: Some(RecordingPatch {
                mode: Some(RecordingMode::Continuous),
                retention_days: None,
            }),
            detect: Some(DetectPatch {
                min_face_px: Some(120),
                ..DetectPatch::default()
            }),
            ..CameraPatch::default()
        };

        let patched = patch.apply(&cam);

        assert_eq!(patched.fps_limit, 10);
        assert_eq!(
            patched.recording,
            RecordingConfig {
                mode: RecordingMode::Continuous,
                retention_days: 7,
            }
        );
        assert_eq!(patched.detect.min_face_px, 120);
        assert_eq!(patched.detect.yolo_every_n, 8);
        assert_eq!(patched.name, "Front");
    }

    #[test]
    fn test_patch_from_json() {
        let patch: CameraPatch =
            serde_json::from_str(r#"{"enabled": false, "privacy": {"blur_faces": true}}"#).unwrap();

        assert_eq!(patch.enabled, Some(false));
        let cam = patch.apply(&CameraConfig::usb("cam_1", "Front", 0));
        assert!(!cam.enabled);
        assert!(cam.privacy.blur_faces);
        assert!(cam.privacy.blur_zones.is_empty());
    }
}
