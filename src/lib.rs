//! flockweigh
//!
//! Streaming aggregation of tracked detections into per-subject measurements.
//!
//! # Architecture
//!
//! A run consumes one video frame by frame. For every frame the external tracker
//! reports `(track_id, box, confidence)` tuples, and the run produces:
//!
//! 1. **Counts**: distinct track ids per frame.
//! 2. **Weight estimates**: a calibrated power law of box area, folded into
//!    per-track online statistics (mean weight, mean confidence, spread).
//! 3. **Track samples**: raw boxes captured at a fixed frame stride for auditing.
//! 4. **Annotated frames**: boxes, labels and the count drawn onto every frame.
//!
//! Memory stays bounded by the number of distinct tracks; frames are dropped as
//! soon as they are written.
//!
//! # Module Structure
//!
//! - `weight`: calibrated area-to-weight model
//! - `aggregate`: per-track online statistics
//! - `sampling`: fixed-stride audit sampling
//! - `annotate`: frame overlays
//! - `pipeline`: the run state machine and `process`
//! - `detect`, `ingest`, `output`: tracker, frame source and frame sink seams
//! - `config`, `analyzer`: configuration loading and file-to-result wiring

pub mod aggregate;
pub mod analyzer;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod sampling;
pub mod ui;
pub mod weight;

pub use aggregate::{TrackAggregator, TrackStats, TrackSummary};
pub use analyzer::Analyzer;
pub use annotate::{Annotation, AnnotationStyle, FrameAnnotator};
pub use config::{AnalyzerConfig, OutputFormat};
pub use detect::{
    BoundingBox, Detection, ReplayTracker, ScriptedFrame, ScriptedTracker, TrackerBackend,
    TrackerSettings,
};
pub use error::{ErrorKind, ErrorReport, MalformedDetection, PipelineError, WeightError};
pub use frame::{Frame, SourceInfo};
pub use ingest::{FileConfig, FileSource, FrameSource, SyntheticConfig};
#[cfg(feature = "video-ffmpeg")]
pub use output::FfmpegVideoSink;
pub use output::{FrameSink, ImageSequenceSink, MemorySink};
pub use pipeline::{
    process, AnalysisParams, AnalysisResult, PipelineState, RunDiagnostics, VideoPipeline,
};
pub use sampling::{SamplingPolicy, TrackSample, DEFAULT_SAMPLE_STRIDE};
pub use weight::{WeightModel, DEFAULT_CALIBRATION_K};
