use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use flockweigh::{
    process, AnalysisParams, BoundingBox, Detection, ErrorKind, FileConfig, FileSource, Frame,
    FrameSource, MemorySink, PipelineError, ScriptedFrame, ScriptedTracker, SourceInfo,
    SyntheticConfig, VideoPipeline,
};

fn synthetic(frames: u64) -> FileSource {
    FileSource::new(FileConfig::synthetic(
        "barn",
        SyntheticConfig {
            width: 48,
            height: 32,
            fps: 10.0,
            frames,
            seed: 11,
        },
    ))
    .unwrap()
}

fn det(id: u64, bbox: [f32; 4], conf: f32) -> Detection {
    Detection::new(id, BoundingBox::from(bbox), conf)
}

/// Yields `good` frames, then fails every read.
struct FlakySource {
    good: u64,
    served: u64,
}

impl FrameSource for FlakySource {
    fn open(&mut self) -> Result<SourceInfo> {
        Ok(SourceInfo {
            width: 8,
            height: 8,
            fps: 25.0,
            frame_count: None,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.served >= self.good {
            return Err(anyhow!("truncated stream"));
        }
        self.served += 1;
        Ok(Some(Frame::filled(8, 8, [0, 0, 0])))
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn single_track_grows_across_frames() {
    let mut source = synthetic(3);
    let mut tracker = ScriptedTracker::from_detections(vec![
        vec![det(1, [0.0, 0.0, 10.0, 10.0], 0.5)],
        vec![det(1, [0.0, 0.0, 20.0, 20.0], 0.5)],
        vec![],
    ]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    assert_eq!(result.counts, vec![1, 1, 0]);
    assert_eq!(result.weight_estimates.len(), 1);
    let track = &result.weight_estimates[0];
    assert_eq!(track.track_id, 1);
    assert!((track.weight_estimate - 0.225).abs() < 1e-9);
    assert!((track.uncertainty - 0.175).abs() < 1e-9);
    assert!((track.confidence - 0.5).abs() < 1e-9);
    assert_eq!(result.artifacts, vec!["memory://annotated".to_string()]);
    assert_eq!(sink.frames().len(), 3);
    assert!(sink.is_finished());
}

#[test]
fn tracker_failures_keep_one_count_per_frame() {
    let mut source = synthetic(5);
    let mut tracker = ScriptedTracker::always_failing();
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    assert_eq!(result.counts, vec![0; 5]);
    assert!(result.weight_estimates.is_empty());
    assert_eq!(result.diagnostics.frame_failures, 5);
    assert_eq!(sink.frames().len(), 5);
}

#[test]
fn one_failing_frame_does_not_stop_the_run() {
    let mut source = synthetic(3);
    let mut tracker = ScriptedTracker::new(vec![
        ScriptedFrame::Detections(vec![det(2, [0.0, 0.0, 4.0, 4.0], 0.9)]),
        ScriptedFrame::Failure("inference timeout".into()),
        ScriptedFrame::Detections(vec![det(2, [0.0, 0.0, 4.0, 4.0], 0.7)]),
    ]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    assert_eq!(result.counts, vec![1, 0, 1]);
    assert_eq!(result.diagnostics.frame_failures, 1);
    assert!((result.weight_estimates[0].confidence - 0.8).abs() < 1e-6);
}

#[test]
fn missing_video_fails_before_streaming() {
    let mut source = FileSource::new(FileConfig::new("/nonexistent/flock.mp4")).unwrap();
    let mut tracker = ScriptedTracker::default();
    let mut sink = MemorySink::new();

    let err = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.is_fatal());
    assert_eq!(tracker.calls(), 0);
    assert!(sink.frames().is_empty());
}

#[test]
fn read_error_mid_stream_is_fatal() {
    let mut source = FlakySource { good: 2, served: 0 };
    let mut tracker = ScriptedTracker::default();
    let mut sink = MemorySink::new();

    let err = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.to_string().contains("frame 2"), "{err}");
    assert_eq!(sink.frames().len(), 2);
    assert!(sink.is_finished());
}

#[test]
fn sink_failure_is_fatal() {
    let mut source = synthetic(4);
    let mut tracker = ScriptedTracker::default();
    let mut sink = MemorySink::failing_after(1);

    let err = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SinkWriteError);
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        PipelineError::SinkWrite {
            frame_index: Some(1),
            ..
        }
    ));
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn malformed_detections_are_dropped() {
    let mut source = synthetic(2);
    let mut tracker = ScriptedTracker::from_detections(vec![
        vec![
            det(1, [0.0, 0.0, 10.0, 10.0], 0.8),
            det(2, [10.0, 10.0, 5.0, 5.0], 0.8),
            det(3, [f32::NAN, 0.0, 4.0, 4.0], 0.8),
        ],
        vec![det(4, [0.0, 0.0, 4.0, 4.0], 1.5)],
    ]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams {
            sample_stride: Some(1),
            ..AnalysisParams::default()
        },
    )
    .unwrap();

    assert_eq!(result.counts, vec![1, 0]);
    assert_eq!(result.diagnostics.malformed_detections, 3);
    let ids: Vec<u64> = result.weight_estimates.iter().map(|t| t.track_id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(result.tracks_sample.len(), 1);
    assert_eq!(result.tracks_sample[0].id, 1);
}

#[test]
fn far_offscreen_boxes_do_not_abort_the_run() {
    let mut source = synthetic(2);
    let mut tracker = ScriptedTracker::from_detections(vec![
        vec![det(1, [-3.0e9, -3.0e9, 0.0, 0.0], 0.9)],
        vec![
            det(1, [-3.0e9, -3.0e9, 0.0, 0.0], 0.9),
            det(2, [1.0e9, 1.0e9, 2.0e9, 2.0e9], 0.9),
        ],
    ]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    assert_eq!(result.counts, vec![1, 2]);
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(result.weight_estimates.len(), 2);
}

#[test]
fn samples_every_stride_frames() {
    let mut source = synthetic(7);
    let frames = (0..7)
        .map(|i| vec![det(9, [i as f32, 0.0, i as f32 + 5.0, 5.0], 0.9)])
        .collect();
    let mut tracker = ScriptedTracker::from_detections(frames);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams {
            sample_stride: Some(3),
            ..AnalysisParams::default()
        },
    )
    .unwrap();

    let sampled: Vec<u64> = result.tracks_sample.iter().map(|s| s.frame_idx).collect();
    assert_eq!(sampled, vec![0, 3, 6]);
    assert_eq!(result.tracks_sample[1].bbox, [3.0, 0.0, 8.0, 5.0]);
    assert_eq!(result.diagnostics.sample_stride, 3);
}

#[test]
fn stride_defaults_to_one_second_of_video() {
    let mut source = synthetic(12);
    let frames = (0..12)
        .map(|_| vec![det(5, [0.0, 0.0, 6.0, 6.0], 0.9)])
        .collect();
    let mut tracker = ScriptedTracker::from_detections(frames);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    let sampled: Vec<u64> = result.tracks_sample.iter().map(|s| s.frame_idx).collect();
    assert_eq!(sampled, vec![0, 10]);
}

#[test]
fn estimates_are_ordered_by_track_id() {
    let mut source = synthetic(2);
    let mut tracker = ScriptedTracker::from_detections(vec![
        vec![
            det(30, [0.0, 0.0, 3.0, 3.0], 0.6),
            det(7, [0.0, 0.0, 5.0, 5.0], 0.6),
        ],
        vec![det(12, [0.0, 0.0, 4.0, 4.0], 0.6)],
    ]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();

    let ids: Vec<u64> = result.weight_estimates.iter().map(|t| t.track_id).collect();
    assert_eq!(ids, vec![7, 12, 30]);
    assert_eq!(result.counts, vec![2, 1]);
}

#[test]
fn invalid_calibration_is_rejected_before_opening() {
    let mut source = synthetic(2);
    let mut tracker = ScriptedTracker::default();
    let mut sink = MemorySink::new();

    let err = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams {
            calibration_k: 0.0,
            ..AnalysisParams::default()
        },
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(source.frames_read(), 0);
}

#[test]
fn preset_cancel_flag_stops_immediately() {
    let mut source = synthetic(5);
    let mut tracker = ScriptedTracker::default();
    let mut sink = MemorySink::new();

    let err = VideoPipeline::new(
        &mut source,
        &mut tracker,
        &mut sink,
        AnalysisParams::default(),
    )
    .with_cancel_flag(Arc::new(AtomicBool::new(true)))
    .run()
    .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { frames: 0 }));
    assert!(sink.is_finished());
}

#[test]
fn result_serializes_with_stable_field_names() {
    let mut source = synthetic(1);
    let mut tracker =
        ScriptedTracker::from_detections(vec![vec![det(1, [1.0, 2.0, 3.0, 4.0], 0.9)]]);
    let mut sink = MemorySink::new();

    let result = process(
        &mut source,
        &mut tracker,
        &mut sink,
        &AnalysisParams::default(),
    )
    .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["counts"], serde_json::json!([1]));
    assert_eq!(
        json["tracks_sample"],
        serde_json::json!([{ "frame_idx": 0, "id": 1, "box": [1.0, 2.0, 3.0, 4.0] }])
    );
    assert_eq!(json["weight_estimates"][0]["track_id"], 1);
    assert!(json["weight_estimates"][0]["weight_estimate"].is_number());
    assert!(json["weight_estimates"][0]["uncertainty"].is_number());
    assert_eq!(json["artifacts"], serde_json::json!(["memory://annotated"]));
    assert!(json.get("diagnostics").is_none());
}
