use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::reporter::{call_sink, panic_message, FrameCallback, HealthReporter};
use super::throttle::{FpsWindow, FrameThrottle};
use crate::camera::{CameraConfig, CaptureBackend, CaptureSource};
use crate::frame::{FrameData, FrameMetadata};
use crate::health::{WorkerHealth, WorkerState};
use crate::recovery::{Backoff, BackoffConfig};

/// Health updates made by one run of the loop.
///
/// Once the run is cancelled only the final STOPPED gets through, and only
/// while no newer run has started.
struct RunHealth {
    reporter: Arc<HealthReporter>,
    generation: u64,
    token: CancellationToken,
}

impl RunHealth {
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut WorkerHealth),
    {
        self.apply(|health| {
            f(health);
            true
        });
    }

    fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut WorkerHealth) -> bool,
    {
        self.reporter.apply_run(self.generation, &self.token, f);
    }

    fn finish(&self) {
        self.reporter.apply(Some(self.generation), |health| {
            health.state = WorkerState::Stopped;
            true
        });
    }
}

/// One capture run: open, read, throttle, emit, reconnect
pub(super) struct RunLoop {
    config: Arc<CameraConfig>,
    backend: Arc<dyn CaptureBackend>,
    on_frame: Option<FrameCallback>,
    health: RunHealth,
    token: CancellationToken,
    backoff: Backoff,
    throttle: FrameThrottle,
    fps: FpsWindow,
}

impl RunLoop {
    pub fn new(
        config: Arc<CameraConfig>,
        backend: Arc<dyn CaptureBackend>,
        on_frame: Option<FrameCallback>,
        reporter: Arc<HealthReporter>,
        generation: u64,
        token: CancellationToken,
        backoff: BackoffConfig,
    ) -> Self {
        let throttle = FrameThrottle::new(config.min_frame_interval());
        Self {
            config,
            backend,
            on_frame,
            health: RunHealth {
                reporter,
                generation,
                token: token.clone(),
            },
            token,
            backoff: Backoff::new(backoff),
            throttle,
            fps: FpsWindow::new(Instant::now()),
        }
    }

    pub async fn run(mut self) {
        let camera_id = self.config.id.clone();
        debug!(
            "Worker loop for camera {} started (min interval {:?})",
            camera_id,
            self.throttle.min_interval()
        );

        let mut source = self.open().await;

        while !self.token.is_cancelled() {
            match source.as_mut() {
                None => {
                    self.health.update(|h| h.state = WorkerState::Degraded);

                    let delay = self.backoff.current();
                    debug!("Camera {} reconnecting in {:?}", camera_id, delay);
                    tokio::select! {
                        biased;
                        _ = self.token.cancelled() => break,
                        _ = sleep(delay) => {}
                    }

                    source = self.open().await;
                    if source.is_some() {
                        self.backoff.reset();
                    } else {
                        self.backoff.on_failure();
                    }
                }
                Some(active) => {
                    let read = tokio::select! {
                        biased;
                        _ = self.token.cancelled() => break,
                        read = active.read_frame() => read,
                    };

                    match read {
                        Ok(frame) => self.handle_frame(frame),
                        Err(e) => {
                            warn!("Camera {} read failed: {}", camera_id, e);
                            self.health.update(|h| {
                                h.dropped_total += 1;
                                h.last_error = Some(e.to_string());
                                h.state = WorkerState::Degraded;
                            });
                            active.release();
                            source = None;
                        }
                    }
                }
            }
        }

        if let Some(mut active) = source.take() {
            active.release();
        }
        self.health.finish();
        debug!("Worker loop for camera {} exited", camera_id);
    }

    async fn open(&mut self) -> Option<Box<dyn CaptureSource>> {
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => return None,
            result = self.backend.open(&self.config) => result,
        };

        match result {
            Ok(source) => {
                info!(
                    "Camera {} opened via {} ({})",
                    self.config.id,
                    self.backend.name(),
                    self.config.source
                );
                self.health.update(|h| {
                    h.state = WorkerState::Running;
                    h.last_ok_at = Some(Utc::now());
                    h.last_error = None;
                });
                Some(source)
            }
            Err(e) => {
                warn!("Camera {} failed to open: {}", self.config.id, e);
                self.health.update(|h| {
                    h.state = WorkerState::Error;
                    h.last_error = Some(e.to_string());
                });
                None
            }
        }
    }

    fn handle_frame(&mut self, frame: FrameData) {
        let now = Instant::now();
        if !self.throttle.admit(now) {
            trace!(
                "Camera {} frame {} discarded by throttle",
                self.config.id,
                frame.sequence
            );
            return;
        }

        let emitted_at = Utc::now();
        let fps = self.fps.record(now);
        self.health.apply(|h| {
            let state_changed = h.state != WorkerState::Running;
            h.frames_total += 1;
            h.last_frame_at = Some(emitted_at);
            h.last_ok_at = Some(emitted_at);
            h.state = WorkerState::Running;
            if let Some(fps) = fps {
                h.fps_estimate = fps;
            }
            state_changed || fps.is_some()
        });

        let Some(on_frame) = &self.on_frame else {
            return;
        };

        let metadata = FrameMetadata {
            camera_id: self.config.id.clone(),
            camera_name: self.config.name.clone(),
            timestamp: emitted_at,
        };
        let failure = match call_sink(|| {
            catch_unwind(AssertUnwindSafe(|| {
                on_frame(&self.config.id, &frame, &metadata)
            }))
        }) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panic: {}", panic_message(panic.as_ref()))),
        };

        if let Some(message) = failure {
            debug!("Camera {} frame sink failed: {}", self.config.id, message);
            self.health
                .update(|h| h.last_error = Some(format!("frame sink: {}", message)));
        }
    }
}
