//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file to RGB24, one frame per call. At the
//! end of the packet stream the decoder is flushed so trailing buffered frames are
//! not lost.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::{Frame, SourceInfo};

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: f64,
    frame_count: Option<u64>,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let fps = f64::from(input_stream.avg_frame_rate());
        let frame_count = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            fps: if fps.is_finite() { fps } else { 0.0 },
            frame_count,
            eof_sent: false,
        })
    }

    pub(crate) fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.decoder.width(),
            height: self.decoder.height(),
            fps: self.fps,
            frame_count: self.frame_count,
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                return Frame::from_rgb(width, height, pixels).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .with_context(|| format!("decode packet from {}", self.path))?;
                sent = true;
                break;
            }
            if !sent {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.eof_sent = true;
            }
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
