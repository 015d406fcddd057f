//! Local file frame source.
//!
//! This module provides `FileSource` for ingesting frames from a local video file.
//! The file source is responsible for:
//! - Rejecting remote locations (only local paths and `stub://` are accepted)
//! - Decoding frames in order, one at a time
//! - Reporting resolution and nominal frame rate when opened
//!
//! The file source MUST NOT:
//! - Fetch remote URLs
//! - Buffer more than the frame currently being decoded

use std::path::Path;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{Frame, SourceInfo};

/// Shape of the video generated for `stub://` paths.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
    /// Seed for the sensor-noise generator; equal seeds give identical videos.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
            frames: 90,
            seed: 0,
        }
    }
}

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "uploads/birds.mp4"), or `stub://<name>`.
    pub path: String,
    /// Used only for `stub://` paths.
    pub synthetic: SyntheticConfig,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn synthetic(name: &str, synthetic: SyntheticConfig) -> Self {
        Self {
            path: format!("stub://{}", name),
            synthetic,
        }
    }

    /// File name component of the path, used to name derived artifacts.
    pub fn file_name(&self) -> String {
        let trimmed = self.path.strip_prefix("stub://").unwrap_or(&self.path);
        Path::new(trimmed)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "video".to_string())
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    backend: Option<FileBackend>,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Validate the location. No I/O happens until `open`.
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        Ok(Self {
            config,
            backend: None,
            frames_read: 0,
        })
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn open_backend(&self) -> Result<(FileBackend, SourceInfo)> {
        if self.config.path.starts_with("stub://") {
            let source = SyntheticFileSource::new(self.config.synthetic.clone())?;
            let info = source.info();
            return Ok((FileBackend::Synthetic(source), info));
        }
        if !Path::new(&self.config.path).is_file() {
            return Err(anyhow!("video file '{}' does not exist", self.config.path));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            let source = FfmpegFileSource::open(&self.config.path)?;
            let info = source.info();
            Ok((FileBackend::Ffmpeg(source), info))
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding '{}' requires the video-ffmpeg feature",
                self.config.path
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn open(&mut self) -> Result<SourceInfo> {
        let (backend, info) = self.open_backend()?;
        self.backend = Some(backend);
        self.frames_read = 0;
        log::info!(
            "FileSource: opened {} ({}x{} @ {:.2} fps)",
            self.config.path,
            info.width,
            info.height,
            info.fps
        );
        Ok(info)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self.backend.as_mut() {
            None => return Err(anyhow!("file source is not open")),
            Some(FileBackend::Synthetic(source)) => source.next_frame()?,
            #[cfg(feature = "video-ffmpeg")]
            Some(FileBackend::Ffmpeg(source)) => source.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::debug!(
                "FileSource: closed {} after {} frames",
                self.config.path,
                self.frames_read
            );
        }
    }

    fn describe(&self) -> String {
        self.config.path.clone()
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: SyntheticConfig,
    frame_count: u64,
    rng: StdRng,
}

impl SyntheticFileSource {
    fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "synthetic video needs a non-empty resolution, got {}x{}",
                config.width,
                config.height
            ));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            frame_count: 0,
            rng,
        })
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
            frame_count: Some(self.config.frames),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        let pixels = self.generate_synthetic_pixels();
        self.frame_count += 1;
        Frame::from_rgb(self.config.width, self.config.height, pixels).map(Some)
    }

    // Sky-to-ground gradient that drifts with the frame count, plus low-level noise.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let (width, height) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let shade = ((y * 160 / height) as u64 + self.frame_count) % 256;
            for _ in 0..width {
                let noise: u8 = self.rng.gen_range(0..8);
                pixels.push((shade as u8 / 2).wrapping_add(noise));
                pixels.push((shade as u8).wrapping_add(noise));
                pixels.push(200u8.saturating_sub(shade as u8 / 3).wrapping_add(noise));
            }
        }
        pixels
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(frames: u64) -> FileSource {
        FileSource::new(FileConfig::synthetic(
            "birds.mp4",
            SyntheticConfig {
                width: 16,
                height: 8,
                fps: 25.0,
                frames,
                seed: 7,
            },
        ))
        .unwrap()
    }

    #[test]
    fn rejects_remote_and_empty_paths() {
        assert!(FileSource::new(FileConfig::new("rtsp://camera/stream")).is_err());
        assert!(FileSource::new(FileConfig::new("https://example.com/a.mp4")).is_err());
        assert!(FileSource::new(FileConfig::new("  ")).is_err());
        assert!(FileSource::new(FileConfig::new("uploads/birds.mp4")).is_ok());
    }

    #[test]
    fn synthetic_source_yields_configured_frames_then_ends() {
        let mut source = stub(3);
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, Some(3));

        for _ in 0..3 {
            let frame = source.next_frame().unwrap().expect("frame");
            assert_eq!(frame.width(), 16);
        }
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.frames_read(), 3);
        source.close();
        source.close();
    }

    #[test]
    fn synthetic_video_is_deterministic_for_a_seed() {
        let mut a = stub(2);
        let mut b = stub(2);
        a.open().unwrap();
        b.open().unwrap();
        let fa = a.next_frame().unwrap().unwrap();
        let fb = b.next_frame().unwrap().unwrap();
        assert_eq!(fa.as_rgb_bytes(), fb.as_rgb_bytes());
    }

    #[test]
    fn reading_before_open_is_an_error() {
        let mut source = stub(1);
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp4");
        let mut source = FileSource::new(FileConfig::new(path.display().to_string())).unwrap();
        let err = source.open().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn file_name_strips_directories_and_scheme() {
        assert_eq!(FileConfig::new("uploads/birds.mp4").file_name(), "birds.mp4");
        assert_eq!(FileConfig::new("stub://demo").file_name(), "demo");
        assert_eq!(FileConfig::new("stub://").file_name(), "video");
    }
}
