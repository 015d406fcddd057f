//! flockweigh - count, weigh and annotate tracked subjects in one video.
//!
//! Prints the analysis result as JSON on stdout. On failure prints
//! `{"error": {"kind": ..., "message": ...}}` instead and exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flockweigh::ui::Ui;
use flockweigh::{
    AnalysisResult, Analyzer, AnalyzerConfig, ErrorKind, ErrorReport, OutputFormat,
    PipelineError, SyntheticConfig,
};

#[derive(Parser, Debug)]
#[command(name = "flockweigh", version, about = "Count and weigh tracked subjects in a video")]
struct Args {
    /// Video file to analyze (or stub://<name> for a synthetic clip)
    video: String,

    /// JSON Lines tracker output to replay, one record per frame
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,

    /// JSON or TOML config file
    #[arg(long, value_name = "PATH", env = "FLOCKWEIGH_CONFIG")]
    config: Option<PathBuf>,

    /// Calibration constant k in weight = k * area^1.5
    #[arg(long)]
    calibration_k: Option<f64>,

    /// Tracker confidence threshold
    #[arg(long)]
    conf_thresh: Option<f32>,

    /// Tracker IoU threshold
    #[arg(long)]
    iou_thresh: Option<f32>,

    /// Audit sampling stride in frames (default: one second of video)
    #[arg(long)]
    sample_stride: Option<u32>,

    /// Directory receiving the annotated output
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Annotated output format (frames|video)
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Also write the JSON result to this file
    #[arg(long, value_name = "PATH")]
    json_out: Option<PathBuf>,

    /// Frames generated for stub:// videos
    #[arg(long, default_value_t = 90)]
    stub_frames: u64,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(result) => {
            println!("{}", to_json(&result));
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = match err.downcast_ref::<PipelineError>() {
                Some(pipeline_err) => pipeline_err.report(),
                None => ErrorReport {
                    kind: ErrorKind::InvalidParameter,
                    message: format!("{:#}", err),
                },
            };
            println!("{}", to_json(&serde_json::json!({ "error": report })));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<AnalysisResult> {
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load configuration");
        load_config(args)?
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received; stopping after the current frame");
            cancel.store(true, Ordering::Relaxed);
        })
        .context("install Ctrl-C handler")?;
    }

    let analyzer = Analyzer::new(config)
        .with_synthetic(SyntheticConfig {
            frames: args.stub_frames,
            ..SyntheticConfig::default()
        })
        .with_cancel_flag(cancel);
    let mut tracker = {
        let _stage = ui.stage("Open tracker output");
        analyzer.configured_tracker()?
    };

    let result = {
        let _stage = ui.stage("Analyze video");
        let mut progress = ui.frames(None);
        analyzer.analyze(&args.video, tracker.as_mut(), |done, total| {
            progress.update(done, total)
        })?
    };

    if let Some(path) = &args.json_out {
        std::fs::write(path, to_json(&result))
            .with_context(|| format!("write result to {}", path.display()))?;
    }
    Ok(result)
}

fn load_config(args: &Args) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::load_from(args.config.as_deref())?;
    if let Some(k) = args.calibration_k {
        config.calibration_k = k;
    }
    if let Some(conf) = args.conf_thresh {
        config.confidence_threshold = conf;
    }
    if let Some(iou) = args.iou_thresh {
        config.iou_threshold = iou;
    }
    if let Some(stride) = args.sample_stride {
        config.sample_stride = Some(stride);
    }
    if let Some(dir) = &args.out_dir {
        config.artifacts_dir = dir.clone();
    }
    if let Some(format) = &args.format {
        config.output_format = format.parse::<OutputFormat>()?;
    }
    if let Some(path) = &args.detections {
        config.detections_path = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}
