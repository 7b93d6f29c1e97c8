use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, trace, warn};

use crate::frame::{FrameData, FrameMetadata};
use crate::health::{WorkerHealth, WorkerState};
use crate::worker::{FrameCallback, HealthCallback};

/// Health sink that logs state transitions; repeated reports in the same
/// state are logged at trace level only
pub fn logging_health_sink() -> HealthCallback {
    let last_states: Mutex<HashMap<String, WorkerState>> = Mutex::new(HashMap::new());

    Arc::new(move |health: WorkerHealth| {
        let previous = last_states
            .lock()
            .insert(health.camera_id.clone(), health.state);
        if previous == Some(health.state) {
            trace!(
                camera_id = %health.camera_id,
                fps = health.fps_estimate,
                frames = health.frames_total,
                "Camera health update"
            );
            return Ok(());
        }

        match health.state {
            WorkerState::Degraded | WorkerState::Error => warn!(
                camera_id = %health.camera_id,
                state = %health.state,
                dropped = health.dropped_total,
                error = health.last_error.as_deref().unwrap_or(""),
                "Camera state changed"
            ),
            _ => info!(
                camera_id = %health.camera_id,
                state = %health.state,
                "Camera state changed"
            ),
        }
        Ok(())
    })
}

/// Frame sink for the standalone daemon: frames are only traced
pub fn frame_trace_sink() -> FrameCallback {
    Arc::new(|camera_id: &str, frame: &FrameData, metadata: &FrameMetadata| {
        trace!(
            camera_id,
            sequence = frame.sequence,
            bytes = frame.data.len(),
            width = frame.width,
            height = frame.height,
            at = %metadata.timestamp,
            "Frame emitted"
        );
        Ok(())
    })
}
