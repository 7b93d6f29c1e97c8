use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::CaptureError;

/// Pixel layout of a captured frame. Both capture backends deliver packed RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    Rgb24,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
        }
    }
}

/// A frame as handed out by a capture source.
///
/// The payload is opaque to the supervisor; it is shared so sinks can keep it
/// without copying.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Per-source sequence number
    pub sequence: u64,
    /// When the frame was read from the device
    pub timestamp: SystemTime,
    /// Tightly packed pixel rows
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        sequence: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Build a frame from a buffer whose rows are `stride` bytes apart.
    ///
    /// Row padding is dropped. A buffer too short for the geometry is a read
    /// failure.
    pub fn from_strided(
        sequence: u64,
        timestamp: SystemTime,
        buffer: &[u8],
        stride: usize,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Result<Self, CaptureError> {
        let row = width as usize * format.bytes_per_pixel();
        let rows = height as usize;
        let needed = match rows {
            0 => 0,
            n => stride * (n - 1) + row,
        };
        if stride < row || buffer.len() < needed {
            return Err(CaptureError::read_failed(format!(
                "{} byte buffer (stride {}) is too short for {}x{}",
                buffer.len(),
                stride,
                width,
                height
            )));
        }

        let data = if stride == row {
            buffer[..row * rows].to_vec()
        } else {
            let mut packed = Vec::with_capacity(row * rows);
            for y in 0..rows {
                let offset = y * stride;
                packed.extend_from_slice(&buffer[offset..offset + row]);
            }
            packed
        };

        Ok(Self::new(sequence, timestamp, data, width, height, format))
    }
}

/// Metadata passed to frame sinks alongside every emitted frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub camera_id: String,
    pub camera_name: String,
    pub timestamp: DateTime<Utc>,
}
