//! Sampled local file frame source.
//!
//! `SampledFrameSource` decodes frames from a video container and re-samples them to a
//! caller-chosen rate, independent of the container's native rate. Frames falling
//! between sampling boundaries are decoded and dropped, never buffered.
//!
//! Some container/codec combinations report a corrupt frame and the end of the file
//! the same way. The source retries a failed decode a bounded number of times and only
//! accepts a retried frame when the container position moved forward.

use std::path::Path;

use thiserror::Error;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegDecoder;
use super::synthetic::SyntheticDecoder;
use super::DecodedPicture;
use crate::frame::Frame;

/// Container extensions accepted by `open`, including the leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = [".avi", ".mov", ".flv", ".webm", ".wmv", ".mp4"];

/// Extra decode attempts after a failure before the stream is considered finished.
const MAX_DECODE_RETRIES: u32 = 2;

/// Frames pulled when estimating the native frame rate (10 frame durations).
const PROBE_FRAMES: usize = 11;

const STUB_PREFIX: &str = "stub://";
const STUB_WIDTH: u32 = 320;
const STUB_HEIGHT: u32 = 240;
const STUB_FPS: u32 = 30;
const STUB_FRAMES: u64 = 90;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported file extension: {0:?}")]
    UnsupportedFormat(String),
    #[error("error opening video file {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("unable to estimate fps from input video: {0}")]
    Probe(String),
    #[error("error opening camera {device}: {reason}")]
    Camera { device: String, reason: String },
}

/// Native resolution and estimated frame rate of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeInfo {
    pub height: u32,
    pub width: u32,
    pub fps: u32,
}

enum DecoderBackend {
    Synthetic(SyntheticDecoder),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegDecoder),
}

impl DecoderBackend {
    fn grab(&mut self) -> Option<DecodedPicture> {
        match self {
            DecoderBackend::Synthetic(decoder) => decoder.grab(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            DecoderBackend::Ffmpeg(decoder) => decoder.grab(),
        }
    }

    fn position_ms(&self) -> i64 {
        match self {
            DecoderBackend::Synthetic(decoder) => decoder.position_ms(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            DecoderBackend::Ffmpeg(decoder) => decoder.position_ms(),
        }
    }

    fn frame_count(&self) -> u64 {
        match self {
            DecoderBackend::Synthetic(decoder) => decoder.frame_count(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            DecoderBackend::Ffmpeg(decoder) => decoder.frame_count(),
        }
    }
}

/// Video file source re-sampled to a target rate.
pub struct SampledFrameSource {
    path: String,
    backend: DecoderBackend,
    sampling_fps: u32,
    last_timestamp_ms: i64,
    total_frames: u64,
    current_frame: u64,
}

impl SampledFrameSource {
    /// Open `path` for reading at `sampling_fps` frames per second.
    ///
    /// `sampling_fps == 0` passes every decodable frame through unmodified.
    pub fn open(path: &str, sampling_fps: u32) -> Result<Self, SourceError> {
        check_extension(path)?;
        let backend = if path.starts_with(STUB_PREFIX) {
            DecoderBackend::Synthetic(SyntheticDecoder::constant_rate(
                STUB_WIDTH,
                STUB_HEIGHT,
                STUB_FPS,
                STUB_FRAMES,
            ))
        } else {
            open_container(path)?
        };
        let source = Self::with_backend(path.to_string(), backend, sampling_fps);
        log::debug!(
            "opened {} ({} frames reported, sampling at {} fps)",
            source.path,
            source.total_frames,
            sampling_fps
        );
        Ok(source)
    }

    /// Wrap an already-built synthetic decoder. No extension check is applied.
    pub fn from_synthetic(decoder: SyntheticDecoder, sampling_fps: u32) -> Self {
        Self::with_backend(
            STUB_PREFIX.to_string(),
            DecoderBackend::Synthetic(decoder),
            sampling_fps,
        )
    }

    fn with_backend(path: String, backend: DecoderBackend, sampling_fps: u32) -> Self {
        let total_frames = backend.frame_count();
        let mut source = Self {
            path,
            backend,
            sampling_fps,
            last_timestamp_ms: 0,
            total_frames,
            current_frame: 0,
        };
        // Start one interval in the past so the first frame is always kept.
        source.last_timestamp_ms = if sampling_fps == 0 {
            -1
        } else {
            -source.sampling_interval_ms()
        };
        source
    }

    /// Next frame at the sampling cadence, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let interval = self.sampling_interval_ms();
        loop {
            let frame = self.read_frame_data()?;
            self.current_frame += 1;

            let too_early = interval > 0
                && frame.timestamp_ms > 0
                && frame.timestamp_ms - self.last_timestamp_ms < interval;
            if !too_early {
                self.last_timestamp_ms = frame.timestamp_ms;
                return Some(frame);
            }
        }
    }

    /// Single decode with retry, ignoring the sampling rate.
    ///
    /// A failed decode, or a picture too short for its reported size, is retried up to
    /// twice before reporting end of stream. A frame obtained on a retry only counts if
    /// the container position moved past where it was before the first attempt.
    pub fn read_frame_data(&mut self) -> Option<Frame> {
        let prev_position = self.backend.position_ms();
        for attempt in 0..=MAX_DECODE_RETRIES {
            let Some(picture) = self.backend.grab() else {
                continue;
            };

            let timestamp_ms = self.backend.position_ms();
            if attempt > 0 && timestamp_ms <= prev_position {
                log::debug!(
                    "{}: retried decode did not advance ({} <= {}), treating as end of stream",
                    self.path,
                    timestamp_ms,
                    prev_position
                );
                return None;
            }

            match Frame::new(
                picture.pixels,
                picture.width,
                picture.height,
                picture.stride,
                picture.color_format,
                timestamp_ms,
            ) {
                Ok(frame) => return Some(frame),
                Err(err) => log::warn!(
                    "{}: dropping malformed picture at {} ms: {}",
                    self.path,
                    timestamp_ms,
                    err
                ),
            }
        }
        None
    }

    /// Frame count reported by the container. May be 0 when the container omits it.
    pub fn total_frame_count(&self) -> u64 {
        self.total_frames
    }

    /// Frames decoded so far, including those dropped by sampling.
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn sampling_fps(&self) -> u32 {
        self.sampling_fps
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Estimate resolution and frame rate from a private read pass over `path`.
    pub fn probe(path: &str, sampling_hint: u32) -> Result<ProbeInfo, SourceError> {
        let mut source = Self::open(path, sampling_hint)?;
        source.estimate()
    }

    /// Probe this source's own decoder. Consumes up to 11 frames.
    pub fn estimate(&mut self) -> Result<ProbeInfo, SourceError> {
        let mut timestamps = Vec::with_capacity(PROBE_FRAMES);
        let (mut height, mut width) = (0, 0);
        while timestamps.len() < PROBE_FRAMES {
            let Some(frame) = self.read_frame_data() else {
                break;
            };
            if frame.timestamp_ms >= 0 {
                timestamps.push(frame.timestamp_ms);
            }
            if !frame.is_empty() {
                height = frame.height;
                width = frame.width;
            }
        }

        let fps = estimate_fps(&timestamps).ok_or_else(|| SourceError::Probe(self.path.clone()))?;
        Ok(ProbeInfo { height, width, fps })
    }

    fn sampling_interval_ms(&self) -> i64 {
        if self.sampling_fps == 0 {
            0
        } else {
            1000 / i64::from(self.sampling_fps)
        }
    }
}

/// Frame rate from on-screen durations: `(k - 1) * 1000 / (t[k-1] - t[0])`, rounded
/// half away from zero. `None` with fewer than two timestamps or no elapsed time.
pub fn estimate_fps(timestamps: &[i64]) -> Option<u32> {
    let (first, last) = match timestamps {
        [first, .., last] => (*first, *last),
        _ => return None,
    };
    let span = last - first;
    if span <= 0 {
        return None;
    }
    let fps = (timestamps.len() - 1) as f64 * 1000.0 / span as f64;
    Some(fps.round() as u32)
}

/// Reject paths whose extension is outside `SUPPORTED_EXTENSIONS`. Nothing is opened.
pub fn check_extension(path: &str) -> Result<(), SourceError> {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(SourceError::UnsupportedFormat(ext))
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_container(path: &str) -> Result<DecoderBackend, SourceError> {
    FfmpegDecoder::open(path)
        .map(DecoderBackend::Ffmpeg)
        .map_err(|err| SourceError::Open {
            path: path.to_string(),
            reason: format!("{:#}", err),
        })
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_container(path: &str) -> Result<DecoderBackend, SourceError> {
    Err(SourceError::Open {
        path: path.to_string(),
        reason: "file decoding requires the ingest-file-ffmpeg feature".to_string(),
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
