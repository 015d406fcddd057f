//! Frame-by-frame orchestration of one video run.
//!
//! ```text
//! Opening ──> Streaming ──> Finalizing ──> Done
//!    │            │              │
//!    └────────────┴──────────────┴──> Failed
//! ```
//!
//! Frames are pulled, tracked, aggregated, sampled, annotated and written strictly in
//! order, one at a time. Only the per-track accumulators and the two per-frame output
//! sequences outlive a frame. Source and sink are released on every exit path.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{TrackAggregator, TrackSummary};
use crate::annotate::{Annotation, FrameAnnotator};
use crate::detect::{Detection, TrackerBackend, TrackerSettings};
use crate::error::PipelineError;
use crate::frame::{Frame, SourceInfo};
use crate::ingest::FrameSource;
use crate::output::FrameSink;
use crate::sampling::{SamplingPolicy, TrackSample, DEFAULT_SAMPLE_STRIDE};
use crate::weight::{WeightModel, DEFAULT_CALIBRATION_K};

/// Run-level parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisParams {
    pub calibration_k: f64,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Audit sampling stride in frames. `None` derives it from the source frame rate.
    pub sample_stride: Option<u32>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            calibration_k: DEFAULT_CALIBRATION_K,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            sample_stride: None,
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        WeightModel::new(self.calibration_k)?;
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidParameter(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.sample_stride == Some(0) {
            return Err(PipelineError::InvalidParameter(
                "sample_stride must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
        }
    }

    fn effective_stride(&self, info: &SourceInfo) -> u32 {
        self.sample_stride
            .or_else(|| info.one_second_stride())
            .unwrap_or(DEFAULT_SAMPLE_STRIDE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Opening,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Opening, Streaming)
                | (Opening, Failed)
                | (Streaming, Finalizing)
                | (Streaming, Failed)
                | (Finalizing, Done)
                | (Finalizing, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Counters describing how a run went. Not part of the serialized result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunDiagnostics {
    pub frames_processed: u64,
    pub frame_failures: u64,
    pub malformed_detections: u64,
    pub sample_stride: u32,
    pub source_fps: f64,
}

/// Final output of a successful run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Distinct tracks per frame, one entry per frame pulled from the source.
    pub counts: Vec<u32>,
    pub tracks_sample: Vec<TrackSample>,
    pub weight_estimates: Vec<TrackSummary>,
    pub artifacts: Vec<String>,
    #[serde(skip)]
    pub diagnostics: RunDiagnostics,
}

type ProgressHook<'a> = Box<dyn FnMut(u64, Option<u64>) + 'a>;

/// Mutable state accumulated while streaming.
struct RunState {
    aggregator: TrackAggregator,
    sampling: SamplingPolicy,
    counts: Vec<u32>,
    samples: Vec<TrackSample>,
    frame_failures: u64,
}

impl RunState {
    fn into_result(self, artifacts: Vec<String>, info: &SourceInfo) -> AnalysisResult {
        let diagnostics = RunDiagnostics {
            frames_processed: self.counts.len() as u64,
            frame_failures: self.frame_failures,
            malformed_detections: self.aggregator.malformed_events(),
            sample_stride: self.sampling.stride(),
            source_fps: info.fps,
        };
        AnalysisResult {
            counts: self.counts,
            tracks_sample: self.samples,
            weight_estimates: self.aggregator.finalize(),
            artifacts,
            diagnostics,
        }
    }
}

pub struct VideoPipeline<'a> {
    source: &'a mut dyn FrameSource,
    tracker: &'a mut dyn TrackerBackend,
    sink: &'a mut dyn FrameSink,
    params: AnalysisParams,
    annotator: FrameAnnotator,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<ProgressHook<'a>>,
    state: PipelineState,
}

impl<'a> VideoPipeline<'a> {
    pub fn new(
        source: &'a mut dyn FrameSource,
        tracker: &'a mut dyn TrackerBackend,
        sink: &'a mut dyn FrameSink,
        params: AnalysisParams,
    ) -> Self {
        Self {
            source,
            tracker,
            sink,
            params,
            annotator: FrameAnnotator::default(),
            cancel: None,
            progress: None,
            state: PipelineState::Opening,
        }
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Abort between frames once `flag` is set. Frames already written stay valid.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Called after each written frame with the frames done so far and the source's
    /// frame-count hint.
    pub fn with_progress(mut self, hook: impl FnMut(u64, Option<u64>) + 'a) -> Self {
        self.progress = Some(Box::new(hook));
        self
    }

    /// Run the video to completion. Consumes the pipeline; a run happens once.
    pub fn run(mut self) -> Result<AnalysisResult, PipelineError> {
        let (info, mut run) = match self.open() {
            Ok(opened) => opened,
            Err(err) => {
                self.transition(PipelineState::Failed);
                log::error!("pipeline failed while opening: {}", err);
                return Err(err);
            }
        };

        self.transition(PipelineState::Streaming);
        if let Err(err) = self.stream(&info, &mut run) {
            self.transition(PipelineState::Failed);
            if let Err(release_err) = self.release() {
                log::warn!("release after failure also failed: {}", release_err);
            }
            log::error!(
                "pipeline failed after {} frames: {}",
                run.counts.len(),
                err
            );
            return Err(err);
        }

        self.transition(PipelineState::Finalizing);
        let artifacts = match self.release() {
            Ok(artifacts) => artifacts,
            Err(err) => {
                self.transition(PipelineState::Failed);
                log::error!("pipeline failed while finalizing: {}", err);
                return Err(err);
            }
        };
        let result = run.into_result(artifacts, &info);
        self.transition(PipelineState::Done);

        log::info!(
            "run finished: {} frames, {} tracks, {} frame failures, {} malformed detections",
            result.diagnostics.frames_processed,
            result.weight_estimates.len(),
            result.diagnostics.frame_failures,
            result.diagnostics.malformed_detections
        );
        Ok(result)
    }

    fn open(&mut self) -> Result<(SourceInfo, RunState), PipelineError> {
        self.params.validate()?;
        let model = WeightModel::new(self.params.calibration_k)?;

        let info = self
            .source
            .open()
            .map_err(PipelineError::source_unavailable)?;
        if info.width == 0 || info.height == 0 {
            self.source.close();
            return Err(PipelineError::SourceUnavailable {
                message: format!(
                    "{} reports an empty resolution {}x{}",
                    self.source.describe(),
                    info.width,
                    info.height
                ),
            });
        }

        let stride = self.params.effective_stride(&info);
        let Some(sampling) = SamplingPolicy::with_stride(stride) else {
            self.source.close();
            return Err(PipelineError::InvalidParameter(
                "sample_stride must be at least 1".to_string(),
            ));
        };

        if let Err(err) = self.tracker.configure(&self.params.tracker_settings()) {
            self.source.close();
            return Err(PipelineError::InvalidParameter(format!(
                "tracker '{}' rejected its settings: {:#}",
                self.tracker.name(),
                err
            )));
        }

        if let Err(err) = self.sink.open(&info) {
            self.source.close();
            return Err(PipelineError::sink_write(None, err));
        }

        log::info!(
            "analyzing {} with tracker '{}': {}x{} @ {:.2} fps, k={}, sample stride {}",
            self.source.describe(),
            self.tracker.name(),
            info.width,
            info.height,
            info.fps,
            model.calibration(),
            sampling.stride()
        );

        let run = RunState {
            aggregator: TrackAggregator::new(model),
            sampling,
            counts: Vec::with_capacity(info.frame_count.unwrap_or(0).min(1 << 20) as usize),
            samples: Vec::new(),
            frame_failures: 0,
        };
        Ok((info, run))
    }

    fn stream(&mut self, info: &SourceInfo, run: &mut RunState) -> Result<(), PipelineError> {
        let mut frame_index = 0u64;
        loop {
            if self.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    frames: frame_index,
                });
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(err) => {
                    return Err(PipelineError::SourceUnavailable {
                        message: format!("read failed at frame {}: {:#}", frame_index, err),
                    })
                }
            };

            self.process_frame(frame_index, frame, run)?;
            frame_index += 1;

            if let Some(progress) = self.progress.as_mut() {
                progress(frame_index, info.frame_count);
            }
        }
    }

    fn process_frame(
        &mut self,
        frame_index: u64,
        mut frame: Frame,
        run: &mut RunState,
    ) -> Result<(), PipelineError> {
        let detections = match self.tracker.track(frame_index, &frame) {
            Ok(detections) => detections,
            Err(err) => {
                let err = PipelineError::FrameProcessing {
                    frame_index,
                    message: format!("{:#}", err),
                };
                log::warn!("{}", err);
                run.frame_failures += 1;
                Vec::new()
            }
        };

        let mut accepted: Vec<Detection> = Vec::with_capacity(detections.len());
        let mut annotations: Vec<Annotation> = Vec::with_capacity(detections.len());
        for det in detections {
            match run
                .aggregator
                .observe(det.track_id, &det.bbox, det.confidence)
            {
                Ok(weight) => {
                    annotations.push(Annotation {
                        track_id: det.track_id,
                        bbox: det.bbox,
                        weight,
                    });
                    accepted.push(det);
                }
                Err(source) => {
                    log::warn!(
                        "{}",
                        PipelineError::MalformedDetection {
                            frame_index,
                            source
                        }
                    );
                }
            }
        }

        let count = accepted
            .iter()
            .map(|det| det.track_id)
            .collect::<HashSet<_>>()
            .len();
        run.samples
            .extend(run.sampling.samples_for(frame_index, &accepted));

        self.annotator
            .annotate_and_write(&mut frame, &annotations, count, &mut *self.sink)
            .map_err(|err| PipelineError::sink_write(Some(frame_index), err))?;

        run.counts.push(count as u32);
        log::trace!(
            "frame {}: {} detections, count {}",
            frame_index,
            accepted.len(),
            count
        );
        Ok(())
    }

    fn release(&mut self) -> Result<Vec<String>, PipelineError> {
        self.source.close();
        self.sink
            .finish()
            .map_err(|err| PipelineError::sink_write(None, err))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal pipeline transition {} -> {}",
            self.state,
            next
        );
        log::debug!("pipeline: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Process one video with default annotation styling.
pub fn process(
    source: &mut dyn FrameSource,
    tracker: &mut dyn TrackerBackend,
    sink: &mut dyn FrameSink,
    params: &AnalysisParams,
) -> Result<AnalysisResult, PipelineError> {
    VideoPipeline::new(source, tracker, sink, params.clone()).run()
}
