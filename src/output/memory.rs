use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{check_resolution, FrameSink};
use crate::frame::{Frame, SourceInfo};

/// Keeps every written frame in memory.
///
/// `failing_after(n)` accepts `n` frames and then rejects every write, which lets
/// callers exercise the fatal sink path.
#[derive(Default)]
pub struct MemorySink {
    info: Option<SourceInfo>,
    frames: Vec<RgbImage>,
    fail_after: Option<usize>,
    finished: bool,
    location: String,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            location: "memory://annotated".to_string(),
            ..Self::default()
        }
    }

    pub fn failing_after(frames: usize) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::new()
        }
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn open(&mut self, info: &SourceInfo) -> Result<()> {
        self.info = Some(info.clone());
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        check_resolution(self.info.as_ref(), frame)?;
        if self.fail_after.is_some_and(|limit| self.frames.len() >= limit) {
            return Err(anyhow!("memory sink refused frame {}", self.frames.len()));
        }
        self.frames.push(frame.image().clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<String>> {
        self.finished = true;
        Ok(vec![self.location.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SourceInfo {
        SourceInfo {
            width: 4,
            height: 4,
            fps: 30.0,
            frame_count: None,
        }
    }

    #[test]
    fn stores_frames_in_order() {
        let mut sink = MemorySink::new();
        sink.open(&info()).unwrap();
        sink.write_frame(&Frame::filled(4, 4, [1, 1, 1])).unwrap();
        sink.write_frame(&Frame::filled(4, 4, [2, 2, 2])).unwrap();
        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.frames()[1].get_pixel(0, 0).0, [2, 2, 2]);
        assert_eq!(sink.finish().unwrap(), vec!["memory://annotated".to_string()]);
        assert!(sink.is_finished());
    }

    #[test]
    fn rejects_wrong_resolution_and_unopened_writes() {
        let mut sink = MemorySink::new();
        assert!(sink.write_frame(&Frame::filled(4, 4, [0, 0, 0])).is_err());
        sink.open(&info()).unwrap();
        assert!(sink.write_frame(&Frame::filled(5, 4, [0, 0, 0])).is_err());
    }

    #[test]
    fn injected_failure_after_limit() {
        let mut sink = MemorySink::failing_after(1);
        sink.open(&info()).unwrap();
        assert!(sink.write_frame(&Frame::filled(4, 4, [0, 0, 0])).is_ok());
        assert!(sink.write_frame(&Frame::filled(4, 4, [0, 0, 0])).is_err());
        assert_eq!(sink.frames().len(), 1);
    }
}
