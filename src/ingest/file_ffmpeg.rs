//! Local file decoder using FFmpeg.
//!
//! Decodes the best video stream of a container and converts each picture to packed
//! BGR24. Positions are reported in milliseconds relative to the stream start.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::DecodedPicture;
use crate::frame::ColorFormat;

pub(crate) struct FfmpegDecoder {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: f64,
    start_pts: i64,
    frame_count: u64,
    position_ms: i64,
    drained: bool,
}

impl FfmpegDecoder {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let time_base = f64::from(input_stream.time_base());
        let start_pts = input_stream.start_time().max(0);
        let frame_count = input_stream.frames().max(0) as u64;
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
            ffmpeg::util::format::pixel::Pixel::BGR24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "ffmpeg: opened {} ({}x{}, {} frames reported)",
            path,
            decoder.width(),
            decoder.height(),
            frame_count
        );

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            time_base,
            start_pts,
            frame_count,
            position_ms: 0,
            drained: false,
        })
    }

    /// Decode the next picture. `None` covers both a bad packet and end of file.
    pub(crate) fn grab(&mut self) -> Option<DecodedPicture> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded);
            }
            if self.drained {
                return None;
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                if let Err(err) = self.decoder.send_packet(&packet) {
                    log::debug!("{}: decoder rejected packet: {}", self.path, err);
                    return None;
                }
                sent = true;
                break;
            }
            if !sent {
                // Flush frames still held by the decoder.
                let _ = self.decoder.send_eof();
                self.drained = true;
            }
        }
    }

    pub(crate) fn position_ms(&self) -> i64 {
        self.position_ms
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Option<DecodedPicture> {
        let mut bgr = ffmpeg::frame::Video::empty();
        if let Err(err) = self.scaler.run(decoded, &mut bgr) {
            log::debug!("{}: scale to BGR failed: {}", self.path, err);
            return None;
        }

        if let Some(pts) = decoded.timestamp().or_else(|| decoded.pts()) {
            let ticks = (pts - self.start_pts) as f64;
            self.position_ms = (ticks * self.time_base * 1000.0).round() as i64;
        }

        let width = bgr.width();
        let height = bgr.height();
        let stride = bgr.stride(0);
        let plane = bgr.data(0);
        let len = (stride * height as usize).min(plane.len());
        Some(DecodedPicture {
            pixels: plane[..len].to_vec(),
            width,
            height,
            stride,
            color_format: ColorFormat::Bgr,
        })
    }
}
