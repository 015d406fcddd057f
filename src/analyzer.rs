//! Wiring from a configuration and a video path to a finished run.
//!
//! `Analyzer` owns no per-run state: every call to `analyze` builds its own source,
//! sink and aggregator, so one analyzer can serve several videos, including from
//! different threads.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;

use crate::annotate::FrameAnnotator;
use crate::config::{AnalyzerConfig, OutputFormat};
use crate::detect::{ReplayTracker, ScriptedTracker, TrackerBackend};
use crate::error::PipelineError;
use crate::ingest::{FileConfig, FileSource, SyntheticConfig};
use crate::output::{FrameSink, ImageSequenceSink};
use crate::pipeline::{AnalysisResult, VideoPipeline};

/// Prefix of every annotated artifact name.
pub const ANNOTATED_PREFIX: &str = "annotated_";

#[derive(Clone, Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    synthetic: SyntheticConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            synthetic: SyntheticConfig::default(),
            cancel: None,
        }
    }

    /// Shape of the video generated for `stub://` paths.
    pub fn with_synthetic(mut self, synthetic: SyntheticConfig) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Where the annotated copy of `video` is written.
    pub fn output_location(&self, video: &FileConfig) -> PathBuf {
        self.config
            .artifacts_dir
            .join(format!("{}{}", ANNOTATED_PREFIX, video.file_name()))
    }

    /// Tracker selected by the configuration: a replay of the configured detections
    /// file, or a tracker that reports nothing when none is configured.
    pub fn configured_tracker(&self) -> Result<Box<dyn TrackerBackend>> {
        match &self.config.detections_path {
            Some(path) => Ok(Box::new(ReplayTracker::open(path)?)),
            None => {
                log::warn!("no detections configured; every frame will report zero detections");
                Ok(Box::new(ScriptedTracker::default()))
            }
        }
    }

    /// Analyze one video end to end.
    pub fn analyze(
        &self,
        video_path: &str,
        tracker: &mut dyn TrackerBackend,
        progress: impl FnMut(u64, Option<u64>),
    ) -> Result<AnalysisResult, PipelineError> {
        let file_config = FileConfig {
            path: video_path.to_string(),
            synthetic: self.synthetic.clone(),
        };
        let output = self.output_location(&file_config);
        let mut source =
            FileSource::new(file_config).map_err(PipelineError::source_unavailable)?;
        let mut sink = self.build_sink(output)?;

        let mut pipeline = VideoPipeline::new(
            &mut source,
            tracker,
            sink.as_mut(),
            self.config.params(),
        )
        .with_annotator(FrameAnnotator::new(self.config.annotation_style()))
        .with_progress(progress);
        if let Some(flag) = &self.cancel {
            pipeline = pipeline.with_cancel_flag(flag.clone());
        }
        pipeline.run()
    }

    fn build_sink(&self, output: PathBuf) -> Result<Box<dyn FrameSink>, PipelineError> {
        match self.config.output_format {
            OutputFormat::Frames => Ok(Box::new(ImageSequenceSink::new(output))),
            #[cfg(feature = "video-ffmpeg")]
            OutputFormat::Video => Ok(Box::new(crate::output::FfmpegVideoSink::new(output))),
            #[cfg(not(feature = "video-ffmpeg"))]
            OutputFormat::Video => Err(PipelineError::InvalidParameter(
                "video output requires the video-ffmpeg feature".to_string(),
            )),
        }
    }
}
