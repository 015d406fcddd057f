//! Fixed-stride audit sampling of raw track positions.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::detect::Detection;

/// Stride used when neither the caller nor the source frame rate provides one.
pub const DEFAULT_SAMPLE_STRIDE: u32 = 30;

/// True iff `frame_index` is a multiple of `stride`.
pub fn should_sample(frame_index: u64, stride: NonZeroU32) -> bool {
    frame_index % u64::from(stride.get()) == 0
}

/// Sampling decision for a run. Depends only on the frame index and stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingPolicy {
    stride: NonZeroU32,
}

impl SamplingPolicy {
    pub fn new(stride: NonZeroU32) -> Self {
        Self { stride }
    }

    /// Build from a raw stride; `None` for zero.
    pub fn with_stride(stride: u32) -> Option<Self> {
        NonZeroU32::new(stride).map(Self::new)
    }

    pub fn stride(&self) -> u32 {
        self.stride.get()
    }

    pub fn should_sample(&self, frame_index: u64) -> bool {
        should_sample(frame_index, self.stride)
    }

    /// One sample per detection when the frame is on the stride, nothing otherwise.
    pub fn samples_for(&self, frame_index: u64, detections: &[Detection]) -> Vec<TrackSample> {
        if !self.should_sample(frame_index) {
            return Vec::new();
        }
        detections
            .iter()
            .map(|det| TrackSample {
                frame_idx: frame_index,
                id: det.track_id,
                bbox: det.bbox.to_array(),
            })
            .collect()
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            stride: NonZeroU32::new(DEFAULT_SAMPLE_STRIDE).unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// Audit record of a track's raw box at a sampled frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub frame_idx: u64,
    pub id: u64,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
}
