use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a camera worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    #[default]
    Stopped,
    Starting,
    Running,
    /// Capture lost; the worker is waiting to reconnect
    Degraded,
    /// Last open attempt failed. Not terminal: the worker keeps reconnecting.
    Error,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Stopped => "STOPPED",
            WorkerState::Starting => "STARTING",
            WorkerState::Running => "RUNNING",
            WorkerState::Degraded => "DEGRADED",
            WorkerState::Error => "ERROR",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one camera worker, published by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub camera_id: String,
    pub state: WorkerState,
    /// Emitted frames per second over the last closed one-second window
    pub fps_estimate: f64,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub frames_total: u64,
    pub dropped_total: u64,
}

impl WorkerHealth {
    pub fn new<S: Into<String>>(camera_id: S) -> Self {
        Self {
            camera_id: camera_id.into(),
            state: WorkerState::Stopped,
            fps_estimate: 0.0,
            last_frame_at: None,
            last_ok_at: None,
            last_error: None,
            frames_total: 0,
            dropped_total: 0,
        }
    }

    /// Clear everything except the camera id, as at the start of a new run
    pub fn reset(&mut self) {
        let camera_id = std::mem::take(&mut self.camera_id);
        *self = Self::new(camera_id);
    }
}

/// Per-state camera counts derived from the health cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub total: usize,
    pub running: usize,
    pub degraded: usize,
    pub stopped: usize,
    pub error: usize,
}

impl ManagerSnapshot {
    pub fn from_health<'a, I>(health: I) -> Self
    where
        I: IntoIterator<Item = &'a WorkerHealth>,
    {
        let mut snapshot = Self::default();
        for entry in health {
            snapshot.total += 1;
            match entry.state {
                WorkerState::Running => snapshot.running += 1,
                WorkerState::Degraded => snapshot.degraded += 1,
                WorkerState::Stopped => snapshot.stopped += 1,
                WorkerState::Error => snapshot.error += 1,
                WorkerState::Starting => {}
            }
        }
        snapshot
    }
}

impl fmt::Display for ManagerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} running={} degraded={} stopped={} error={}",
            self.total, self.running, self.degraded, self.stopped, self.error
        )
    }
}
