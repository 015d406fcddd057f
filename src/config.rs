use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::annotate::AnnotationStyle;
use crate::pipeline::AnalysisParams;
use crate::weight::DEFAULT_CALIBRATION_K;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_LABEL_SCALE: u32 = 1;
const DEFAULT_COUNT_SCALE: u32 = 3;

#[derive(Debug, Deserialize, Default)]
struct AnalyzerConfigFile {
    calibration_k: Option<f64>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    sample_stride: Option<u32>,
    artifacts_dir: Option<PathBuf>,
    output: Option<OutputConfigFile>,
    tracker: Option<TrackerConfigFile>,
    annotation: Option<AnnotationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    detections_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotationConfigFile {
    label_scale: Option<u32>,
    count_scale: Option<u32>,
}

/// How annotated frames are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Directory of PNG frames.
    #[default]
    Frames,
    /// Encoded video file (requires the video-ffmpeg feature).
    Video,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frames" => Ok(OutputFormat::Frames),
            "video" => Ok(OutputFormat::Video),
            other => Err(anyhow!(
                "unknown output format '{}' (expected 'frames' or 'video')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub calibration_k: f64,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub sample_stride: Option<u32>,
    pub artifacts_dir: PathBuf,
    pub output_format: OutputFormat,
    /// JSON Lines tracker output to replay.
    pub detections_path: Option<PathBuf>,
    pub label_scale: u32,
    pub count_scale: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            calibration_k: DEFAULT_CALIBRATION_K,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            sample_stride: None,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            output_format: OutputFormat::Frames,
            detections_path: None,
            label_scale: DEFAULT_LABEL_SCALE,
            count_scale: DEFAULT_COUNT_SCALE,
        }
    }
}

impl AnalyzerConfig {
    /// Load from the file named by `FLOCKWEIGH_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FLOCKWEIGH_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, but with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => AnalyzerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnalyzerConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let output_format = match file.output.and_then(|output| output.format) {
            Some(format) => format.parse()?,
            None => defaults.output_format,
        };
        Ok(Self {
            calibration_k: file.calibration_k.unwrap_or(defaults.calibration_k),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: file.iou_threshold.unwrap_or(defaults.iou_threshold),
            sample_stride: file.sample_stride,
            artifacts_dir: file.artifacts_dir.unwrap_or(defaults.artifacts_dir),
            output_format,
            detections_path: file.tracker.and_then(|tracker| tracker.detections_path),
            label_scale: file
                .annotation
                .as_ref()
                .and_then(|annotation| annotation.label_scale)
                .unwrap_or(defaults.label_scale),
            count_scale: file
                .annotation
                .and_then(|annotation| annotation.count_scale)
                .unwrap_or(defaults.count_scale),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(k) = env_parse::<f64>("FLOCKWEIGH_CALIBRATION_K", "a number")? {
            self.calibration_k = k;
        }
        if let Some(conf) = env_parse::<f32>("FLOCKWEIGH_CONF_THRESH", "a number")? {
            self.confidence_threshold = conf;
        }
        if let Some(iou) = env_parse::<f32>("FLOCKWEIGH_IOU_THRESH", "a number")? {
            self.iou_threshold = iou;
        }
        if let Some(stride) = env_parse::<u32>("FLOCKWEIGH_SAMPLE_STRIDE", "an integer")? {
            self.sample_stride = Some(stride);
        }
        if let Ok(dir) = std::env::var("FLOCKWEIGH_ARTIFACTS_DIR") {
            if !dir.trim().is_empty() {
                self.artifacts_dir = PathBuf::from(dir);
            }
        }
        if let Ok(format) = std::env::var("FLOCKWEIGH_OUTPUT_FORMAT") {
            if !format.trim().is_empty() {
                self.output_format = format.parse()?;
            }
        }
        if let Ok(path) = std::env::var("FLOCKWEIGH_DETECTIONS") {
            if !path.trim().is_empty() {
                self.detections_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.params()
            .validate()
            .map_err(|e| anyhow!("invalid configuration: {}", e))?;
        if self.label_scale == 0 || self.count_scale == 0 {
            return Err(anyhow!("annotation scales must be at least 1"));
        }
        Ok(())
    }

    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            calibration_k: self.calibration_k,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            sample_stride: self.sample_stride,
        }
    }

    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            label_scale: self.label_scale,
            count_scale: self.count_scale,
            ..AnnotationStyle::default()
        }
    }
}

fn env_parse<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<AnalyzerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
