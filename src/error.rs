//! Error taxonomy for a video-processing run.
//!
//! Fatal kinds end the run and reach the caller as a single `PipelineError`.
//! Recoverable kinds are logged and counted by the pipeline; they never change
//! the shape of the `AnalysisResult`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single detection was rejected before aggregation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MalformedDetection {
    #[error("track {track_id}: negative box extent ({width}x{height})")]
    NegativeExtent {
        track_id: u64,
        width: f64,
        height: f64,
    },
    #[error("track {track_id}: non-finite box coordinates")]
    NonFiniteBox { track_id: u64 },
    #[error("track {track_id}: confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { track_id: u64, confidence: f32 },
}

/// Errors raised by the weight model.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WeightError {
    #[error("invalid area {0}: must be a finite, non-negative number")]
    InvalidArea(f64),
    #[error("invalid calibration constant {0}: must be finite and positive")]
    InvalidCalibration(f64),
}

/// Stable, serializable error kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    SourceUnavailable,
    MalformedDetection,
    FrameProcessingError,
    SinkWriteError,
    InvalidParameter,
    Cancelled,
}

impl ErrorKind {
    /// Fatal kinds abort the run; the rest are absorbed per detection or per frame.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            ErrorKind::MalformedDetection | ErrorKind::FrameProcessingError
        )
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("malformed detection in frame {frame_index}: {source}")]
    MalformedDetection {
        frame_index: u64,
        #[source]
        source: MalformedDetection,
    },

    #[error("frame {frame_index} processing failed: {message}")]
    FrameProcessing { frame_index: u64, message: String },

    #[error("{}", sink_message(.frame_index, .message))]
    SinkWrite {
        frame_index: Option<u64>,
        message: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("run cancelled after {frames} frames")]
    Cancelled { frames: u64 },
}

fn sink_message(frame_index: &Option<u64>, message: &str) -> String {
    match frame_index {
        Some(index) => format!("sink write failed at frame {}: {}", index, message),
        None => format!("sink write failed: {}", message),
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PipelineError::MalformedDetection { .. } => ErrorKind::MalformedDetection,
            PipelineError::FrameProcessing { .. } => ErrorKind::FrameProcessingError,
            PipelineError::SinkWrite { .. } => ErrorKind::SinkWriteError,
            PipelineError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// Structured `{kind, message}` form handed to callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    pub(crate) fn source_unavailable(err: anyhow::Error) -> Self {
        PipelineError::SourceUnavailable {
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn sink_write(frame_index: Option<u64>, err: anyhow::Error) -> Self {
        PipelineError::SinkWrite {
            frame_index,
            message: format!("{:#}", err),
        }
    }
}

impl From<WeightError> for PipelineError {
    fn from(err: WeightError) -> Self {
        PipelineError::InvalidParameter(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}
