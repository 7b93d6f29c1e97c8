pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod manager;
pub mod recovery;
pub mod registry;
pub mod worker;

pub use app::{CamvisorOrchestrator, ShutdownHandle, ShutdownReason};
pub use camera::{CameraConfig, CameraKind, CameraPatch, CaptureBackend, CaptureSource};
pub use config::CamvisorConfig;
pub use error::{CamvisorError, CaptureError, Result, SinkError};
pub use frame::{FrameData, FrameFormat, FrameMetadata};
pub use health::{ManagerSnapshot, WorkerHealth, WorkerState};
pub use manager::{CameraManager, CameraManagerBuilder, ReconcileReport};
pub use recovery::{Backoff, BackoffConfig};
pub use registry::{CameraRegistry, JsonRegistry};
pub use worker::{CameraWorker, FrameCallback, HealthCallback, WorkerCallbacks, WorkerSettings};
