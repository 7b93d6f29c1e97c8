use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraKind {
    #[serde(rename = "USB", alias = "usb", alias = "Usb")]
    Usb,
    #[serde(rename = "RTSP", alias = "rtsp", alias = "Rtsp")]
    Rtsp,
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraKind::Usb => f.write_str("USB"),
            CameraKind::Rtsp => f.write_str("RTSP"),
        }
    }
}

/// Detection cadence for downstream analysis (passed through untouched)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub yolo_every_n: u32,
    pub pose_every_n: u32,
    pub emotion_every_n: u32,
    pub min_face_px: u32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            yolo_every_n: 8,
            pose_every_n: 2,
            emotion_every_n: 14,
            min_face_px: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub blur_faces: bool,
    /// Rectangles or polygons, interpreted by the presentation layer
    pub blur_zones: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingMode {
    #[default]
    Off,
    EventsOnly,
    Continuous,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub mode: RecordingMode,
    pub retention_days: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Off,
            retention_days: 7,
        }
    }
}

/// One camera definition as stored in the registry.
///
/// A worker receives an immutable snapshot of this; changing a running
/// camera means restarting its worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: CameraKind,
    /// "0" style index for USB, rtsp(s):// URL for RTSP
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_fps_limit")]
    pub fps_limit: u32,
    #[serde(default)]
    pub detect: DetectConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub zones: Vec<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CameraConfig {
    fn with_kind(id: &str, name: &str, kind: CameraKind, source: String) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            source,
            enabled: default_enabled(),
            fps_limit: default_fps_limit(),
            detect: DetectConfig::default(),
            privacy: PrivacyConfig::default(),
            recording: RecordingConfig::default(),
            zones: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn usb(id: &str, name: &str, index: u32) -> Self {
        Self::with_kind(id, name, CameraKind::Usb, index.to_string())
    }

    pub fn rtsp(id: &str, name: &str, url: &str) -> Self {
        Self::with_kind(id, name, CameraKind::Rtsp, url.to_string())
    }

    pub fn with_fps_limit(mut self, fps_limit: u32) -> Self {
        self.fps_limit = fps_limit;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Minimum spacing between two emitted frames
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps_limit.max(1) as f64)
    }

    /// Device index for USB cameras
    pub fn device_index(&self) -> Option<u32> {
        match self.kind {
            CameraKind::Usb => self.source.trim().parse().ok(),
            CameraKind::Rtsp => None,
        }
    }
}

fn default_kind() -> CameraKind {
    CameraKind::Usb
}
fn default_source() -> String {
    "0".to_string()
}
fn default_enabled() -> bool {
    true
}
fn default_fps_limit() -> u32 {
    20
}
