use std::time::Duration;
use tokio::time::Instant;

/// Rate limiter for emitted frames.
///
/// Frames arriving sooner than `min_interval` after the last admitted frame
/// are rejected. Rejected frames are not drops; the source is simply faster
/// than the configured limit.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_emit = Some(now);
        true
    }
}

/// One-second frame counter used for the fps estimate
#[derive(Debug, Clone)]
pub struct FpsWindow {
    span: Duration,
    started: Instant,
    frames: u32,
}

impl FpsWindow {
    pub fn new(started: Instant) -> Self {
        Self::with_span(started, Duration::from_secs(1))
    }

    pub fn with_span(started: Instant, span: Duration) -> Self {
        Self {
            span,
            started,
            frames: 0,
        }
    }

    /// Count a frame. Returns the estimate when the window closes.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.span {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64().max(1e-6);
        self.frames = 0;
        self.started = now;
        Some(fps)
    }
}
