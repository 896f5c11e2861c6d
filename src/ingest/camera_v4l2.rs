//! V4L2 capture device.
//!
//! Requests packed BGR24 (or RGB24) at the configured resolution and rate and maps
//! four capture buffers. Devices that only offer other pixel formats are rejected at
//! open time.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::camera::CameraConfig;
use super::DecodedPicture;
use crate::frame::ColorFormat;

const CAPTURE_BUFFERS: u32 = 4;

#[self_referencing]
struct CaptureState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub(crate) struct V4l2Camera {
    path: String,
    state: CaptureState,
    width: u32,
    height: u32,
    stride: usize,
    color_format: ColorFormat,
}

impl V4l2Camera {
    pub(crate) fn open(config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"BGR3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("{}: failed to set capture format: {}", config.device, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let color_format = if format.fourcc == v4l::FourCC::new(b"BGR3") {
            ColorFormat::Bgr
        } else if format.fourcc == v4l::FourCC::new(b"RGB3") {
            ColorFormat::Rgb
        } else {
            return Err(anyhow!(
                "{} captures {}, expected BGR3 or RGB3",
                config.device,
                format.fourcc
            ));
        };

        if config.capture_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.capture_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("{}: failed to set capture rate: {}", config.device, err);
            }
        }

        let row_bytes = format.width as usize * color_format.bytes_per_pixel();
        let stride = (format.stride as usize).max(row_bytes);

        let state = CaptureStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, CAPTURE_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        if (format.width, format.height) != (config.width, config.height) {
            log::info!(
                "{}: device chose {}x{} instead of {}x{}",
                config.device,
                format.width,
                format.height,
                config.width,
                config.height
            );
        }

        Ok(Self {
            path: config.device.clone(),
            state,
            width: format.width,
            height: format.height,
            stride,
            color_format,
        })
    }

    /// Dequeue the next filled buffer and copy it out.
    pub(crate) fn capture(&mut self) -> Result<DecodedPicture> {
        use v4l::io::traits::CaptureStream;

        let pixels = self
            .state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .with_context(|| format!("capture frame from {}", self.path))?;
        Ok(DecodedPicture {
            pixels,
            width: self.width,
            height: self.height,
            stride: self.stride,
            color_format: self.color_format,
        })
    }
}
