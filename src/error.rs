use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamvisorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera not found in registry: {camera_id}")]
    CameraNotFound { camera_id: String },

    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("Invalid camera configuration: {message}")]
    Validation { message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl CamvisorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn camera_not_found<S: Into<String>>(camera_id: S) -> Self {
        Self::CameraNotFound {
            camera_id: camera_id.into(),
        }
    }
}

/// Failures of a capture device. These never leave a worker: they are folded
/// into its health and drive the reconnect cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Could not open capture source: {source_uri} ({details})")]
    OpenFailed { source_uri: String, details: String },

    #[error("Frame read failed: {details}")]
    ReadFailed { details: String },

    #[error("Capture stream ended")]
    EndOfStream,

    #[error("Capture backend error: {details}")]
    Backend { details: String },
}

impl CaptureError {
    pub fn open_failed<S: Into<String>, D: Into<String>>(source_uri: S, details: D) -> Self {
        Self::OpenFailed {
            source_uri: source_uri.into(),
            details: details.into(),
        }
    }

    pub fn read_failed<S: Into<String>>(details: S) -> Self {
        Self::ReadFailed {
            details: details.into(),
        }
    }
}

/// Error raised by an external frame or health consumer.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CamvisorError>;
