//! Frame buffers exchanged between the source, tracker, annotator and sink.
//!
//! - `Frame`: one decoded RGB frame. Owned by the pipeline for the duration of a
//!   single iteration and dropped once written to the sink.
//! - `SourceInfo`: stream properties reported when a source opens.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frames per second. Zero when the container does not report one.
    pub fps: f64,
    /// Frame count advertised by the container, if any. Only a hint.
    pub frame_count: Option<u64>,
}

impl SourceInfo {
    /// Stride giving roughly one sample per second of video at the nominal rate.
    pub fn one_second_stride(&self) -> Option<u32> {
        if self.fps.is_finite() && self.fps >= 1.0 {
            Some(self.fps.round() as u32)
        } else {
            None
        }
    }
}

/// Decoded RGB24 frame.
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap packed RGB24 pixels. Fails when the buffer length does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("pixel buffer rejected for {}x{}", width, height))?;
        Ok(Self { image })
    }

    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Packed RGB24 bytes, row-major.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
