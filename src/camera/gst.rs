use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Pipeline};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

use super::interface::{CaptureBackend, CaptureSource};
use super::types::{CameraConfig, CameraKind};
use crate::error::CaptureError;
use crate::frame::{FrameData, FrameFormat};

/// How long a single pull waits for a sample before reporting a read failure
const PULL_TIMEOUT_SECS: u64 = 5;
/// How long opening waits for the pipeline to reach PLAYING
const OPEN_TIMEOUT_SECS: u64 = 10;

/// GStreamer capture backend: v4l2 for USB indices, rtspsrc for RTSP URLs.
/// Frames are converted to packed RGB before reaching the sink.
#[derive(Debug, Default, Clone)]
pub struct GstreamerBackend;

impl GstreamerBackend {
    pub fn new() -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::Backend {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self)
    }
}

/// Build the pipeline description for a camera
pub fn pipeline_description(camera: &CameraConfig) -> String {
    let tail = "videoconvert ! video/x-raw,format=RGB ! \
                appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false";
    match camera.kind {
        CameraKind::Usb => format!(
            "v4l2src device=/dev/video{} ! {}",
            camera.source.trim(),
            tail
        ),
        CameraKind::Rtsp => format!(
            "rtspsrc location={} latency=200 ! decodebin ! {}",
            camera.source.trim(),
            tail
        ),
    }
}

#[async_trait]
impl CaptureBackend for GstreamerBackend {
    async fn open(&self, camera: &CameraConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let description = pipeline_description(camera);
        let source_uri = camera.source.clone();
        let camera_id = camera.id.clone();

        debug!("Creating GStreamer pipeline for {}: {}", camera_id, description);

        let source = tokio::task::spawn_blocking(move || {
            GstreamerSource::open(camera_id, &source_uri, &description)
        })
        .await
        .map_err(|e| CaptureError::Backend {
            details: format!("Pipeline open task failed: {}", e),
        })??;

        Ok(Box::new(source))
    }

    fn name(&self) -> &'static str {
        "gstreamer"
    }
}

struct GstreamerSource {
    camera_id: String,
    pipeline: Pipeline,
    appsink: AppSink,
    sequence: u64,
    released: bool,
}

impl GstreamerSource {
    fn open(camera_id: String, source_uri: &str, description: &str) -> Result<Self, CaptureError> {
        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| CaptureError::open_failed(source_uri, e.to_string()))?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::open_failed(source_uri, "not a pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CaptureError::open_failed(source_uri, "appsink missing"))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CaptureError::open_failed(source_uri, e.to_string()));
        }

        let (result, _, _) = pipeline.state(ClockTime::from_seconds(OPEN_TIMEOUT_SECS));
        if let Err(e) = result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CaptureError::open_failed(source_uri, e.to_string()));
        }

        info!("GStreamer pipeline playing for camera {}", camera_id);

        Ok(Self {
            camera_id,
            pipeline,
            appsink,
            sequence: 0,
            released: false,
        })
    }
}

fn sample_to_frame(sample: &gstreamer::Sample, sequence: u64) -> Result<FrameData, CaptureError> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| CaptureError::read_failed("No buffer in sample"))?;
    let caps = sample
        .caps()
        .ok_or_else(|| CaptureError::read_failed("No caps in sample"))?;
    let info = VideoInfo::from_caps(caps)
        .map_err(|e| CaptureError::read_failed(format!("Failed to get video info: {}", e)))?;
    let map = buffer
        .map_readable()
        .map_err(|e| CaptureError::read_failed(format!("Failed to map buffer: {}", e)))?;
    let stride = usize::try_from(info.stride()[0])
        .map_err(|_| CaptureError::read_failed("Negative row stride"))?;

    FrameData::from_strided(
        sequence,
        SystemTime::now(),
        map.as_slice(),
        stride,
        info.width(),
        info.height(),
        FrameFormat::Rgb24,
    )
}

#[async_trait]
impl CaptureSource for GstreamerSource {
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError> {
        if self.released {
            return Err(CaptureError::read_failed("capture released"));
        }

        let appsink = self.appsink.clone();
        let sequence = self.sequence;

        // A dropped read leaves this pull running on the blocking pool until
        // it times out or release() flushes the pipeline.
        let frame = tokio::task::spawn_blocking(move || {
            match appsink.try_pull_sample(ClockTime::from_seconds(PULL_TIMEOUT_SECS)) {
                Some(sample) => sample_to_frame(&sample, sequence),
                None if appsink.is_eos() => Err(CaptureError::EndOfStream),
                None => Err(CaptureError::read_failed("Timed out waiting for sample")),
            }
        })
        .await
        .map_err(|e| CaptureError::Backend {
            details: format!("Pull task failed: {}", e),
        })??;

        self.sequence += 1;
        trace!(
            "Pulled frame {} for camera {} ({}x{}, {} bytes)",
            frame.sequence,
            self.camera_id,
            frame.width,
            frame.height,
            frame.data.len()
        );
        Ok(frame)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(
                "Failed to stop GStreamer pipeline for camera {}: {}",
                self.camera_id, e
            );
        }
    }
}

impl Drop for GstreamerSource {
    fn drop(&mut self) {
        self.release();
    }
}
