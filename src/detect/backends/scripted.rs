use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::TrackerBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// What a scripted tracker reports for one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptedFrame {
    Detections(Vec<Detection>),
    Failure(String),
}

/// Tracker that replays an in-memory script, one entry per frame.
///
/// Frames past the end of the script report no detections. Detections are returned
/// exactly as scripted; thresholds are not applied.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTracker {
    script: VecDeque<ScriptedFrame>,
    fail_every_frame: bool,
    calls: u64,
}

impl ScriptedTracker {
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Script made only of detection lists.
    pub fn from_detections(frames: Vec<Vec<Detection>>) -> Self {
        Self::new(frames.into_iter().map(ScriptedFrame::Detections).collect())
    }

    /// Tracker whose every call fails.
    pub fn always_failing() -> Self {
        Self {
            fail_every_frame: true,
            ..Self::default()
        }
    }

    /// Number of `track` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl TrackerBackend for ScriptedTracker {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn track(&mut self, frame_index: u64, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.fail_every_frame {
            return Err(anyhow!("scripted tracker failure at frame {}", frame_index));
        }
        match self.script.pop_front() {
            Some(ScriptedFrame::Detections(dets)) => Ok(dets),
            Some(ScriptedFrame::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn replays_script_then_goes_quiet() {
        let det = Detection::new(1, BoundingBox::new(0.0, 0.0, 2.0, 2.0), 0.9);
        let mut tracker = ScriptedTracker::new(vec![
            ScriptedFrame::Detections(vec![det.clone()]),
            ScriptedFrame::Failure("model crashed".into()),
        ]);
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        assert_eq!(tracker.track(0, &frame).unwrap(), vec![det]);
        let err = tracker.track(1, &frame).unwrap_err();
        assert_eq!(err.to_string(), "model crashed");
        assert!(tracker.track(2, &frame).unwrap().is_empty());
        assert_eq!(tracker.calls(), 3);
    }

    #[test]
    fn always_failing_fails_every_frame() {
        let mut tracker = ScriptedTracker::always_failing();
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        for i in 0..5 {
            assert!(tracker.track(i, &frame).is_err());
        }
    }
}
