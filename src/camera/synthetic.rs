use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::interface::{CaptureBackend, CaptureSource};
use super::types::{CameraConfig, CameraKind};
use crate::error::CaptureError;
use crate::frame::{FrameData, FrameFormat};

/// Test-pattern capture backend.
///
/// Accepts the same source strings as a real device (numeric USB index,
/// rtsp:// URL) and produces moving RGB gradients at a fixed native rate.
/// Used when no capture hardware is available.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    fps: u32,
    width: u32,
    height: u32,
}

impl SyntheticBackend {
    pub fn new(fps: u32, width: u32, height: u32) -> Self {
        Self {
            fps: fps.max(1),
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(30, 320, 240)
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn open(&self, camera: &CameraConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
        match camera.kind {
            CameraKind::Usb => {
                if camera.device_index().is_none() {
                    return Err(CaptureError::open_failed(
                        &camera.source,
                        "USB source is not a device index",
                    ));
                }
            }
            CameraKind::Rtsp => {
                let url = camera.source.trim();
                if !(url.starts_with("rtsp://") || url.starts_with("rtsps://")) {
                    return Err(CaptureError::open_failed(
                        &camera.source,
                        "RTSP source must use rtsp:// or rtsps://",
                    ));
                }
            }
        }

        debug!(
            "Opened synthetic source for camera {} ({}x{} @ {}fps)",
            camera.id, self.width, self.height, self.fps
        );

        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.fps as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Box::new(SyntheticSource {
            camera_id: camera.id.clone(),
            ticker,
            sequence: 0,
            width: self.width,
            height: self.height,
            released: false,
        }))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

struct SyntheticSource {
    camera_id: String,
    ticker: Interval,
    sequence: u64,
    width: u32,
    height: u32,
    released: bool,
}

impl SyntheticSource {
    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.sequence % 256) as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(shift as u8);
            }
        }
        data
    }
}

#[async_trait]
impl CaptureSource for SyntheticSource {
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError> {
        if self.released {
            return Err(CaptureError::read_failed("capture released"));
        }

        self.ticker.tick().await;

        let frame = FrameData::new(
            self.sequence,
            SystemTime::now(),
            self.render(),
            self.width,
            self.height,
            FrameFormat::Rgb24,
        );
        self.sequence += 1;

        trace!(
            "Generated synthetic frame {} for camera {}",
            frame.sequence,
            self.camera_id
        );
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
