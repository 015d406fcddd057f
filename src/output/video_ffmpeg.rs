//! Encoded video sink using FFmpeg.
//!
//! Frames are converted from RGB24 to YUV420P and encoded as MPEG-4 Part 2 at the
//! source frame rate. Packets are written interleaved as they leave the encoder.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::{check_resolution, FrameSink};
use crate::frame::{Frame, SourceInfo};

const FALLBACK_FPS: i32 = 30;

struct EncoderState {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    next_pts: i64,
}

pub struct FfmpegVideoSink {
    path: PathBuf,
    info: Option<SourceInfo>,
    state: Option<EncoderState>,
}

impl FfmpegVideoSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            info: None,
            state: None,
        }
    }
}

impl EncoderState {
    fn open(path: &PathBuf, info: &SourceInfo) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let fps = if info.fps.is_finite() && info.fps >= 1.0 {
            info.fps.round() as i32
        } else {
            FALLBACK_FPS
        };

        let mut output = ffmpeg::format::output(path)
            .with_context(|| format!("failed to create video output '{}'", path.display()))?;
        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("MPEG-4 encoder is not available"))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let mut stream = output.add_stream(codec).context("add video stream")?;
        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create video encoder")?;
        encoder.set_width(info.width);
        encoder.set_height(info.height);
        encoder.set_format(ffmpeg::format::Pixel::YUV420P);
        encoder.set_time_base(ffmpeg::Rational::new(1, fps));
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder.open_as(codec).context("open MPEG-4 encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(ffmpeg::Rational::new(1, fps));
        let stream_index = stream.index();

        output.write_header().context("write container header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("video stream vanished after header"))?;

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGB24,
            info.width,
            info.height,
            ffmpeg::format::Pixel::YUV420P,
            info.width,
            info.height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            output,
            encoder,
            scaler,
            encoder_time_base: ffmpeg::Rational::new(1, fps),
            stream_time_base,
            next_pts: 0,
        })
    }

    fn encode(&mut self, frame: &Frame) -> Result<()> {
        let width = frame.width();
        let height = frame.height();
        let mut rgb = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row_bytes = width as usize * 3;
        let src = frame.as_rgb_bytes();
        let dst = rgb.data_mut(0);
        for row in 0..height as usize {
            dst[row * stride..row * stride + row_bytes]
                .copy_from_slice(&src[row * row_bytes..(row + 1) * row_bytes]);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to encoder")?;
        self.drain_packets()
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.encoder.send_eof().context("flush encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .context("write container trailer")?;
        Ok(())
    }
}

impl FrameSink for FfmpegVideoSink {
    fn open(&mut self, info: &SourceInfo) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }
        self.state = Some(EncoderState::open(&self.path, info)?);
        self.info = Some(info.clone());
        log::info!(
            "FfmpegVideoSink: encoding {}x{} @ {:.2} fps to {}",
            info.width,
            info.height,
            info.fps,
            self.path.display()
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        check_resolution(self.info.as_ref(), frame)?;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("video sink is not open"))?;
        state.encode(frame)
    }

    fn finish(&mut self) -> Result<Vec<String>> {
        self.info = None;
        if let Some(state) = self.state.take() {
            state.finish()?;
        }
        Ok(vec![self.path.display().to_string()])
    }
}
