use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::recovery::BackoffConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamvisorConfig {
    pub registry: RegistryConfig,
    pub worker: WorkerConfig,
    pub supervisor: SupervisorConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryConfig {
    /// Path to the camera registry JSON document
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkerConfig {
    /// First reconnect wait after a capture failure, in seconds
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: f64,

    /// Upper bound for the reconnect wait, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,

    /// How long `stop` waits for a worker loop before abandoning it
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupervisorConfig {
    /// Registry reload + reconcile period in seconds (0 disables it)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Status snapshot log period in seconds (0 disables it)
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,

    /// Upper bound for stopping every worker on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Which capture backend opens devices
    #[serde(default)]
    pub backend: CaptureBackendKind,

    /// Native frame rate of the synthetic test-pattern source
    #[serde(default = "default_synthetic_fps")]
    pub synthetic_fps: u32,

    /// Synthetic frame width in pixels
    #[serde(default = "default_synthetic_width")]
    pub synthetic_width: u32,

    /// Synthetic frame height in pixels
    #[serde(default = "default_synthetic_height")]
    pub synthetic_height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackendKind {
    #[default]
    Synthetic,
    Gstreamer,
}

impl CamvisorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camvisor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "registry.path",
                default_registry_path().to_string_lossy().to_string(),
            )?
            .set_default("worker.initial_backoff_secs", default_initial_backoff_secs())?
            .set_default("worker.max_backoff_secs", default_max_backoff_secs())?
            .set_default("worker.stop_timeout_ms", default_stop_timeout_ms())?
            .set_default(
                "supervisor.reconcile_interval_secs",
                default_reconcile_interval_secs(),
            )?
            .set_default(
                "supervisor.status_interval_secs",
                default_status_interval_secs(),
            )?
            .set_default(
                "supervisor.shutdown_timeout_secs",
                default_shutdown_timeout_secs(),
            )?
            .set_default("capture.backend", "synthetic")?
            .set_default("capture.synthetic_fps", default_synthetic_fps())?
            .set_default("capture.synthetic_width", default_synthetic_width())?
            .set_default("capture.synthetic_height", default_synthetic_height())?
            .add_source(File::with_name(&path_str).required(false))
            // CAMVISOR_WORKER__STOP_TIMEOUT_MS=500 style overrides
            .add_source(
                Environment::with_prefix("CAMVISOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: CamvisorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.initial_backoff_secs.is_nan() || self.worker.initial_backoff_secs <= 0.0 {
            return Err(ConfigError::Message(
                "worker.initial_backoff_secs must be greater than 0".to_string(),
            ));
        }

        if self.worker.max_backoff_secs < self.worker.initial_backoff_secs {
            return Err(ConfigError::Message(
                "worker.max_backoff_secs must not be below worker.initial_backoff_secs"
                    .to_string(),
            ));
        }

        if self.worker.stop_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "worker.stop_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.supervisor.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "supervisor.shutdown_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.capture.synthetic_fps == 0 {
            return Err(ConfigError::Message(
                "capture.synthetic_fps must be greater than 0".to_string(),
            ));
        }

        if self.capture.synthetic_width == 0 || self.capture.synthetic_height == 0 {
            return Err(ConfigError::Message(
                "Synthetic frame size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl WorkerConfig {
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_secs_f64(self.initial_backoff_secs),
            max: Duration::from_secs_f64(self.max_backoff_secs),
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for CamvisorConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                path: default_registry_path(),
            },
            worker: WorkerConfig {
                initial_backoff_secs: default_initial_backoff_secs(),
                max_backoff_secs: default_max_backoff_secs(),
                stop_timeout_ms: default_stop_timeout_ms(),
            },
            supervisor: SupervisorConfig {
                reconcile_interval_secs: default_reconcile_interval_secs(),
                status_interval_secs: default_status_interval_secs(),
                shutdown_timeout_secs: default_shutdown_timeout_secs(),
            },
            capture: CaptureConfig {
                backend: CaptureBackendKind::default(),
                synthetic_fps: default_synthetic_fps(),
                synthetic_width: default_synthetic_width(),
                synthetic_height: default_synthetic_height(),
            },
        }
    }
}

// Default value functions
fn default_registry_path() -> PathBuf {
    PathBuf::from("config/cameras.json")
}

fn default_initial_backoff_secs() -> f64 {
    1.5
}
fn default_max_backoff_secs() -> f64 {
    20.0
}
fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_reconcile_interval_secs() -> u64 {
    5
}
fn default_status_interval_secs() -> u64 {
    30
}
fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_synthetic_fps() -> u32 {
    30
}
fn default_synthetic_width() -> u32 {
    320
}
fn default_synthetic_height() -> u32 {
    240
}
