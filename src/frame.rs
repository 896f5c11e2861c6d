//! Frame values and detection result sets.
//!
//! - `Frame`: immutable decoded picture plus its presentation timestamp.
//! - `ResultSet<T>`: per-frame mapping from tracked entity id to detector payload.
//!
//! Pixel data is shared behind an `Arc`, so a frame can be paired with a result set,
//! handed to the detector thread and annotated without copying or mutating the buffer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};

/// Opaque tracked-entity identifier. Stable while the detector keeps tracking the entity.
pub type EntityId = u32;

/// One detector callback worth of results, keyed by entity id.
pub type ResultSet<T> = BTreeMap<EntityId, T>;

/// Pixel layout of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Bgr,
    Rgb,
    Gray,
}

impl ColorFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::Bgr | ColorFormat::Rgb => 3,
            ColorFormat::Gray => 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Decoded frame. Packed interleaved pixels with an explicit row stride.
///
/// Timestamps are milliseconds from the start of the source. Within one playback pass
/// they never decrease.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, `>= width * bytes_per_pixel`.
    pub stride: usize,
    pub color_format: ColorFormat,
    pub timestamp_ms: i64,
    pixels: Arc<[u8]>,
}

impl Frame {
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        color_format: ColorFormat,
        timestamp_ms: i64,
    ) -> Result<Self> {
        let row_bytes = width as usize * color_format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(anyhow!(
                "stride {} is smaller than a {}px row ({} bytes)",
                stride,
                width,
                row_bytes
            ));
        }
        let needed = stride * height as usize;
        if pixels.len() < needed {
            return Err(anyhow!(
                "pixel buffer holds {} bytes, {}x{} frame needs {}",
                pixels.len(),
                width,
                height,
                needed
            ));
        }
        Ok(Self {
            width,
            height,
            stride,
            color_format,
            timestamp_ms,
            pixels: pixels.into(),
        })
    }

    /// Tightly packed frame (`stride == width * bytes_per_pixel`).
    pub fn packed(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        color_format: ColorFormat,
        timestamp_ms: i64,
    ) -> Result<Self> {
        let stride = width as usize * color_format.bytes_per_pixel();
        Self::new(pixels, width, height, stride, color_format, timestamp_ms)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel bytes of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * self.color_format.bytes_per_pixel();
        &self.pixels[start..start + len]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("color_format", &self.color_format)
            .field("timestamp_ms", &self.timestamp_ms)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_frame_rows_are_contiguous() {
        let pixels: Vec<u8> = (0..24).collect();
        let frame = Frame::packed(pixels, 4, 2, ColorFormat::Bgr, 40).unwrap();
        assert_eq!(frame.stride, 12);
        assert_eq!(frame.row(1), &(12..24).collect::<Vec<u8>>()[..]);
    }

    #[test]
    fn row_skips_stride_padding() {
        let mut pixels = vec![0u8; 16];
        pixels[8] = 7;
        pixels[6] = 99; // padding
        let frame = Frame::new(pixels, 2, 2, 8, ColorFormat::Bgr, 0).unwrap();
        assert_eq!(frame.row(1)[0], 7);
        assert_eq!(frame.row(0).len(), 6);
    }

    #[test]
    fn rejects_short_buffers_and_strides() {
        assert!(Frame::new(vec![0; 10], 2, 2, 6, ColorFormat::Bgr, 0).is_err());
        assert!(Frame::new(vec![0; 64], 4, 2, 8, ColorFormat::Rgb, 0).is_err());
    }

    #[test]
    fn clones_share_pixels() {
        let frame = Frame::packed(vec![1, 2, 3], 1, 1, ColorFormat::Rgb, 5).unwrap();
        let copy = frame.clone();
        assert_eq!(copy.pixels().as_ptr(), frame.pixels().as_ptr());
        assert_eq!(copy.timestamp_ms, 5);
    }
}
