//! Frame sources.
//!
//! - Local video files (decoded with FFmpeg, feature: video-ffmpeg)
//! - Synthetic `stub://` videos (tests, demos)
//!
//! A source reports its resolution and nominal frame rate when opened, then yields
//! frames in order until it signals end of sequence with `Ok(None)`. A read error
//! is reported as `Err` and is distinct from the end of the video.

#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod file;

use anyhow::Result;

use crate::frame::{Frame, SourceInfo};

pub use file::{FileConfig, FileSource, SyntheticConfig};

pub trait FrameSource {
    /// Acquire the underlying video. Failure here means the video cannot be read.
    fn open(&mut self) -> Result<SourceInfo>;

    /// Next frame, or `None` once the video is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying video. Safe to call more than once.
    fn close(&mut self) {}

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}
