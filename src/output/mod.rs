//! Annotated frame sinks.
//!
//! A sink receives exactly one annotated frame per source frame, in source order
//! and at source resolution. Sinks must stay consistent up to the last frame they
//! accepted, so a run aborted between frames leaves a usable artifact.
//!
//! - `ImageSequenceSink`: one PNG file per frame in a directory
//! - `MemorySink`: frames kept in memory (tests, embedding)
//! - `FfmpegVideoSink`: encoded video file (feature: video-ffmpeg)

mod image_sequence;
mod memory;
#[cfg(feature = "video-ffmpeg")]
mod video_ffmpeg;

use anyhow::{anyhow, Result};

use crate::frame::{Frame, SourceInfo};

pub use image_sequence::ImageSequenceSink;
pub use memory::MemorySink;
#[cfg(feature = "video-ffmpeg")]
pub use video_ffmpeg::FfmpegVideoSink;

pub trait FrameSink {
    /// Prepare the sink for frames described by `info`.
    fn open(&mut self, info: &SourceInfo) -> Result<()>;

    /// Append one frame. Any error here is fatal for the run.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the sink, returning the locations of the produced artifacts.
    fn finish(&mut self) -> Result<Vec<String>>;
}

/// Reject frames that do not match the resolution the sink was opened with.
pub(crate) fn check_resolution(info: Option<&SourceInfo>, frame: &Frame) -> Result<()> {
    let info = info.ok_or_else(|| anyhow!("sink is not open"))?;
    if frame.width() != info.width || frame.height() != info.height {
        return Err(anyhow!(
            "frame is {}x{} but sink was opened for {}x{}",
            frame.width(),
            frame.height(),
            info.width,
            info.height
        ));
    }
    Ok(())
}
