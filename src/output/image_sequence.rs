//! Directory-of-PNGs sink.
//!
//! Every frame becomes `frame_NNNNNN.png` inside the output directory. Each file is
//! written to a temporary name and renamed into place, so the directory never holds
//! a half-written frame. Opening the sink removes frame files left by an earlier run
//! into the same directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{check_resolution, FrameSink};
use crate::frame::{Frame, SourceInfo};

pub struct ImageSequenceSink {
    dir: PathBuf,
    info: Option<SourceInfo>,
    frames_written: u64,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            info: None,
            frames_written: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }

    // Only files this sink could have produced are touched.
    fn remove_stale_frames(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("list output directory {}", self.dir.display()))?;
        let mut removed = 0;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("list output directory {}", self.dir.display()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let ours = name.starts_with("frame_")
                && (name.ends_with(".png") || name.ends_with(".png.partial"));
            if !ours || !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            fs::remove_file(entry.path())
                .with_context(|| format!("remove stale frame {}", entry.path().display()))?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl FrameSink for ImageSequenceSink {
    fn open(&mut self, info: &SourceInfo) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output directory {}", self.dir.display()))?;
        let stale = self.remove_stale_frames()?;
        if stale > 0 {
            log::debug!(
                "ImageSequenceSink: removed {} frames left by an earlier run in {}",
                stale,
                self.dir.display()
            );
        }
        self.info = Some(info.clone());
        self.frames_written = 0;
        log::info!(
            "ImageSequenceSink: writing {}x{} frames to {}",
            info.width,
            info.height,
            self.dir.display()
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        check_resolution(self.info.as_ref(), frame)?;
        let path = self.frame_path(self.frames_written);
        let partial = path.with_extension("png.partial");
        frame
            .image()
            .save_with_format(&partial, image::ImageFormat::Png)
            .map_err(|e| anyhow!("encode {}: {}", partial.display(), e))?;
        fs::rename(&partial, &path)
            .with_context(|| format!("move frame into place at {}", path.display()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<String>> {
        self.info = None;
        Ok(vec![self.dir.display().to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_numbered_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated_birds.mp4");
        let mut sink = ImageSequenceSink::new(&out);
        sink.open(&SourceInfo {
            width: 8,
            height: 6,
            fps: 25.0,
            frame_count: Some(2),
        })
        .unwrap();
        sink.write_frame(&Frame::filled(8, 6, [10, 20, 30])).unwrap();
        sink.write_frame(&Frame::filled(8, 6, [40, 50, 60])).unwrap();
        let artifacts = sink.finish().unwrap();

        assert_eq!(artifacts, vec![out.display().to_string()]);
        assert_eq!(sink.frames_written(), 2);
        let second = image::open(out.join("frame_000001.png")).unwrap().to_rgb8();
        assert_eq!(second.dimensions(), (8, 6));
        assert_eq!(second.get_pixel(0, 0).0, [40, 50, 60]);
        assert!(!out.join("frame_000001.png.partial").exists());
    }

    #[test]
    fn reopening_drops_frames_from_a_longer_earlier_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("annotated_pen.mp4");
        let info = SourceInfo {
            width: 4,
            height: 4,
            fps: 10.0,
            frame_count: None,
        };
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("notes.txt"), b"keep").unwrap();
        fs::write(out.join("frame_000009.png.partial"), b"torn").unwrap();

        let mut sink = ImageSequenceSink::new(&out);
        sink.open(&info).unwrap();
        for _ in 0..5 {
            sink.write_frame(&Frame::filled(4, 4, [1, 1, 1])).unwrap();
        }
        sink.finish().unwrap();

        let mut sink = ImageSequenceSink::new(&out);
        sink.open(&info).unwrap();
        for _ in 0..2 {
            sink.write_frame(&Frame::filled(4, 4, [2, 2, 2])).unwrap();
        }
        sink.finish().unwrap();

        let mut names: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["frame_000000.png", "frame_000001.png", "notes.txt"]
        );
    }
}
