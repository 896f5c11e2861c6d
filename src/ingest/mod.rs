//! Frame ingestion sources.
//!
//! The processing loop pulls frames through the `FrameSource` trait. Two sources exist:
//! - `SampledFrameSource` reads a local video container and re-samples it to a target
//!   rate, decoding with FFmpeg (feature: ingest-file-ffmpeg) or the synthetic decoder
//!   for `stub://` paths
//! - `CameraSource` captures from a V4L2 device (feature: ingest-v4l2) or a synthetic
//!   `stub://` camera
//!
//! The file source is responsible for:
//! - Rejecting containers outside the extension allow-list before opening anything
//! - Telling decode errors apart from end of stream
//! - Dropping frames that fall inside the sampling interval
//! - Probing resolution and frame rate from the first few timestamps

pub mod camera;
#[cfg(feature = "ingest-v4l2")]
pub(crate) mod camera_v4l2;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod source;
pub mod synthetic;

pub use camera::{CameraConfig, CameraSource};
pub use file::{
    check_extension, estimate_fps, ProbeInfo, SampledFrameSource, SourceError,
    SUPPORTED_EXTENSIONS,
};
pub use source::{FrameSource, InputSource};
pub use synthetic::{SyntheticDecoder, SyntheticStep};

use crate::frame::ColorFormat;

/// One decoded picture before it is stamped with the container position.
pub(crate) struct DecodedPicture {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub color_format: ColorFormat,
}
