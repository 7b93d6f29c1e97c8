mod builder;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod interface;
mod patch;
mod synthetic;
mod types;
#[cfg(test)]
mod tests;

pub use builder::backend_from_config;
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::{pipeline_description, GstreamerBackend};
pub use interface::{CaptureBackend, CaptureSource};
pub use patch::{CameraPatch, DetectPatch, PrivacyPatch, RecordingPatch};
pub use synthetic::SyntheticBackend;
pub use types::{
    CameraConfig, CameraKind, DetectConfig, PrivacyConfig, RecordingConfig, RecordingMode,
};
