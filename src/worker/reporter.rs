use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SinkError;
use crate::frame::{FrameData, FrameMetadata};
use crate::health::{WorkerHealth, WorkerState};

/// Receives every frame a worker emits. Errors are recorded in the worker's
/// health and never stop the worker.
pub type FrameCallback =
    Arc<dyn Fn(&str, &FrameData, &FrameMetadata) -> Result<(), SinkError> + Send + Sync>;

/// Receives a health snapshot whenever it materially changes
pub type HealthCallback = Arc<dyn Fn(WorkerHealth) -> Result<(), SinkError> + Send + Sync>;

/// Owns a worker's health record and publishes it.
///
/// Publication is serialized, so a single worker's updates reach the
/// callback in the order they were made. Each run of the loop gets a
/// generation number; updates tagged with an old generation are dropped.
pub(crate) struct HealthReporter {
    publish: Mutex<()>,
    health: Mutex<WorkerHealth>,
    generation: AtomicU64,
    on_health: Option<HealthCallback>,
}

impl HealthReporter {
    pub fn new(camera_id: &str, on_health: Option<HealthCallback>) -> Self {
        Self {
            publish: Mutex::new(()),
            health: Mutex::new(WorkerHealth::new(camera_id)),
            generation: AtomicU64::new(0),
            on_health,
        }
    }

    pub fn snapshot(&self) -> WorkerHealth {
        self.health.lock().clone()
    }

    /// Start a new run: counters reset, state STARTING
    pub fn begin_run(&self) -> u64 {
        self.with_sink(|| {
            let _publish = self.publish.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let value = {
                let mut health = self.health.lock();
                health.reset();
                health.state = WorkerState::Starting;
                health.clone()
            };
            self.emit(value);
            generation
        })
    }

    /// Mutate and always publish
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut WorkerHealth),
    {
        self.apply(None, |health| {
            f(health);
            true
        });
    }

    /// Mutate the record; publish when `f` returns true.
    ///
    /// With `Some(generation)` the change is skipped unless that run is
    /// still the current one. Returns whether the change was applied.
    pub fn apply<F>(&self, generation: Option<u64>, f: F) -> bool
    where
        F: FnOnce(&mut WorkerHealth) -> bool,
    {
        self.apply_gated(generation, None, f)
    }

    /// A run's own update: skipped once `token` is cancelled or a newer run
    /// has started.
    ///
    /// The token is checked under the publish lock, so nothing from a
    /// cancelled run lands after the STOPPED that `stop` publishes.
    pub fn apply_run<F>(&self, generation: u64, token: &CancellationToken, f: F) -> bool
    where
        F: FnOnce(&mut WorkerHealth) -> bool,
    {
        self.apply_gated(Some(generation), Some(token), f)
    }

    fn apply_gated<F>(
        &self,
        generation: Option<u64>,
        token: Option<&CancellationToken>,
        f: F,
    ) -> bool
    where
        F: FnOnce(&mut WorkerHealth) -> bool,
    {
        self.with_sink(|| {
            let _publish = self.publish.lock();
            if token.is_some_and(CancellationToken::is_cancelled) {
                return false;
            }
            if let Some(generation) = generation {
                if generation != self.generation.load(Ordering::SeqCst) {
                    return false;
                }
            }

            let value = {
                let mut health = self.health.lock();
                if !f(&mut health) {
                    return true;
                }
                health.clone()
            };
            self.emit(value);
            true
        })
    }

    /// Publication may wait on the health sink; without one nothing blocks
    fn with_sink<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.on_health.is_some() {
            call_sink(f)
        } else {
            f()
        }
    }

    fn emit(&self, value: WorkerHealth) {
        let Some(callback) = &self.on_health else {
            return;
        };

        let camera_id = value.camera_id.clone();
        match catch_unwind(AssertUnwindSafe(|| callback(value))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Health sink failed for camera {}: {}", camera_id, e);
            }
            Err(panic) => {
                warn!(
                    "Health sink panicked for camera {}: {}",
                    camera_id,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

/// Run code that calls a consumer callback or may wait on one.
///
/// Sinks are synchronous and may block. On the multi-thread runtime the
/// worker thread is handed off first, so a blocking sink holds up only its
/// own camera and not the timers and tasks of the rest of the runtime.
pub(crate) fn call_sink<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(f),
        _ => f(),
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
