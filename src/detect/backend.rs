use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Thresholds handed to the tracker when a run opens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Detections below this confidence are not reported.
    pub confidence_threshold: f32,
    /// Overlap above which the weaker of two boxes is suppressed.
    pub iou_threshold: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        }
    }
}

/// External detector/tracker seam.
///
/// Implementations turn pixels into detections carrying persistent track ids. The
/// pipeline tolerates id churn (new ids, vanished ids, reused ids); it only relies on
/// `track` being called once per frame, in frame order.
pub trait TrackerBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Apply run-level thresholds. Called once before the first frame.
    fn configure(&mut self, _settings: &TrackerSettings) -> Result<()> {
        Ok(())
    }

    /// Detections for one frame. An error marks this frame as failed; the run
    /// continues with the next frame.
    fn track(&mut self, frame_index: u64, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Drop detections under the confidence threshold, then greedily suppress boxes that
/// overlap a more confident box by more than the IoU threshold.
pub fn apply_thresholds(mut detections: Vec<Detection>, settings: &TrackerSettings) -> Vec<Detection> {
    detections.retain(|d| d.confidence >= settings.confidence_threshold);
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.bbox.iou(&det.bbox) > settings.iou_threshold as f64);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
