//! Replay of precomputed tracker output.
//!
//! Reads JSON Lines produced by an external detector/tracker, one object per frame:
//!
//! ```text
//! {"frame_idx": 0, "detections": [{"id": 1, "box": [x1, y1, x2, y2], "conf": 0.91}]}
//! {"frame_idx": 2, "error": "CUDA out of memory"}
//! ```
//!
//! Records must be in ascending `frame_idx` order. Frames without a record have no
//! detections; a record with `error` replays a detector failure for that frame. The
//! file is read incrementally, one record ahead of the current frame. A detection
//! element that does not decode is dropped with a warning; the rest of its frame is kept.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::{apply_thresholds, TrackerBackend, TrackerSettings};
use crate::detect::result::Detection;
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    frame_idx: u64,
    // Decoded one by one so a bad element only loses itself.
    #[serde(default)]
    detections: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ReplayTracker {
    source: String,
    reader: Box<dyn BufRead>,
    pending: Option<ReplayRecord>,
    settings: TrackerSettings,
    line_no: u64,
    exhausted: bool,
}

impl ReplayTracker {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open detections file {}", path.display()))?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }

    pub fn from_reader(source: impl Into<String>, reader: impl BufRead + 'static) -> Self {
        Self {
            source: source.into(),
            reader: Box::new(reader),
            pending: None,
            settings: TrackerSettings::default(),
            line_no: 0,
            exhausted: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<ReplayRecord>> {
        let mut line = String::new();
        while !self.exhausted {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("read {} line {}", self.source, self.line_no + 1))?;
            if read == 0 {
                self.exhausted = true;
                break;
            }
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line.trim())
                .with_context(|| format!("parse {} line {}", self.source, self.line_no))?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn decode_detections(&self, frame_index: u64, raw: Vec<serde_json::Value>) -> Vec<Detection> {
        raw.into_iter()
            .enumerate()
            .filter_map(|(i, value)| match serde_json::from_value::<Detection>(value) {
                Ok(det) => Some(det),
                Err(e) => {
                    log::warn!(
                        "ReplayTracker: dropping malformed detection {} of frame {} in {} line {}: {}",
                        i,
                        frame_index,
                        self.source,
                        self.line_no,
                        e
                    );
                    None
                }
            })
            .collect()
    }
}

impl TrackerBackend for ReplayTracker {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn configure(&mut self, settings: &TrackerSettings) -> Result<()> {
        self.settings = *settings;
        log::info!(
            "ReplayTracker: replaying {} (conf>={:.2}, iou<={:.2})",
            self.source,
            settings.confidence_threshold,
            settings.iou_threshold
        );
        Ok(())
    }

    fn track(&mut self, frame_index: u64, _frame: &Frame) -> Result<Vec<Detection>> {
        loop {
            if self.pending.is_none() {
                match self.next_record()? {
                    Some(record) => self.pending = Some(record),
                    None => return Ok(Vec::new()),
                }
            }
            let Some(record) = self.pending.take() else {
                return Ok(Vec::new());
            };
            if record.frame_idx < frame_index {
                log::warn!(
                    "ReplayTracker: skipping out-of-order record for frame {} (at frame {})",
                    record.frame_idx,
                    frame_index
                );
                continue;
            }
            if record.frame_idx > frame_index {
                self.pending = Some(record);
                return Ok(Vec::new());
            }
            if let Some(error) = record.error {
                return Err(anyhow!("replayed detector failure: {}", error));
            }
            let detections = self.decode_detections(frame_index, record.detections);
            return Ok(apply_thresholds(detections, &self.settings));
        }
    }
}
