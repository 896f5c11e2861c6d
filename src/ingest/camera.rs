//! Live camera frame source.
//!
//! `CameraSource` captures from a local V4L2 device (feature: ingest-v4l2), or from a
//! synthetic camera for `stub://` devices. Frames are stamped with monotonic
//! milliseconds since capture started, so timestamps follow the wall clock of the
//! capture rather than a container. A camera has no sampling stage: every captured
//! frame is returned, and detector load shows up as result lag instead.

use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "ingest-v4l2")]
use super::camera_v4l2::V4l2Camera;
use super::file::SourceError;
use super::source::FrameSource;
use super::DecodedPicture;
use crate::frame::{ColorFormat, Frame};

const STUB_PREFIX: &str = "stub://";

pub const DEFAULT_CAPTURE_FPS: u32 = 30;
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device node (e.g. `/dev/video0`), or `stub://<name>` for the synthetic camera.
    pub device: String,
    /// Requested capture rate. Not every camera honours it.
    pub capture_fps: u32,
    /// Requested resolution; the device may pick the closest mode it supports.
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames. `None` captures until the run is interrupted.
    pub frame_limit: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::for_id(0)
    }
}

impl CameraConfig {
    /// Camera `id` as a V4L2 device node.
    pub fn for_id(id: u32) -> Self {
        Self::for_device(&format!("/dev/video{}", id))
    }

    pub fn for_device(device: &str) -> Self {
        Self {
            device: device.to_string(),
            capture_fps: DEFAULT_CAPTURE_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_limit: None,
        }
    }

    /// Synthetic camera named `name`.
    pub fn stub(name: &str) -> Self {
        Self::for_device(&format!("{}{}", STUB_PREFIX, name))
    }

    /// Parse a command-line camera argument: a numeric id or a device path.
    pub fn from_arg(arg: &str) -> Self {
        match arg.trim().parse::<u32>() {
            Ok(id) => Self::for_id(id),
            Err(_) => Self::for_device(arg.trim()),
        }
    }
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Camera),
}

impl CameraBackend {
    fn capture(&mut self) -> anyhow::Result<DecodedPicture> {
        match self {
            CameraBackend::Synthetic(camera) => Ok(camera.capture()),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.capture(),
        }
    }
}

pub struct CameraSource {
    device: String,
    backend: CameraBackend,
    started: Instant,
    frame_limit: Option<u64>,
    captured: u64,
}

impl CameraSource {
    /// Open and configure the camera. The capture clock starts here.
    pub fn open(config: &CameraConfig) -> Result<Self, SourceError> {
        let backend = if config.device.starts_with(STUB_PREFIX) {
            CameraBackend::Synthetic(SyntheticCamera::new(config))
        } else {
            open_device(config)?
        };
        log::info!(
            "camera {} opened ({}x{} requested at {} fps)",
            config.device,
            config.width,
            config.height,
            config.capture_fps
        );
        Ok(Self {
            device: config.device.clone(),
            backend,
            started: Instant::now(),
            frame_limit: config.frame_limit,
            captured: 0,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.frame_limit.is_some_and(|limit| self.captured >= limit) {
            return None;
        }
        let picture = match self.backend.capture() {
            Ok(picture) => picture,
            Err(err) => {
                log::warn!("failed to read frame from {}: {:#}", self.device, err);
                return None;
            }
        };
        let timestamp_ms = self.elapsed_ms();
        match Frame::new(
            picture.pixels,
            picture.width,
            picture.height,
            picture.stride,
            picture.color_format,
            timestamp_ms,
        ) {
            Ok(frame) => {
                self.captured += 1;
                Some(frame)
            }
            Err(err) => {
                log::warn!("{}: unusable capture buffer: {}", self.device, err);
                None
            }
        }
    }

    fn total_frame_count(&self) -> u64 {
        0
    }

    fn current_frame(&self) -> u64 {
        self.captured
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(config: &CameraConfig) -> Result<CameraBackend, SourceError> {
    V4l2Camera::open(config)
        .map(CameraBackend::Device)
        .map_err(|err| SourceError::Camera {
            device: config.device.clone(),
            reason: format!("{:#}", err),
        })
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(config: &CameraConfig) -> Result<CameraBackend, SourceError> {
    Err(SourceError::Camera {
        device: config.device.clone(),
        reason: "camera capture requires the ingest-v4l2 feature".to_string(),
    })
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

/// Paced picture generator standing in for a device.
struct SyntheticCamera {
    width: u32,
    height: u32,
    interval: Duration,
    started: Instant,
    frames: u32,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: &CameraConfig) -> Self {
        let interval = if config.capture_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(1000 / u64::from(config.capture_fps))
        };
        Self {
            width: config.width,
            height: config.height,
            interval,
            started: Instant::now(),
            frames: 0,
            scene_state: 0,
        }
    }

    /// Blocks until the next frame is due, like a device delivering at its own rate.
    fn capture(&mut self) -> DecodedPicture {
        let due = self.started + self.interval * self.frames;
        thread::sleep(due.saturating_duration_since(Instant::now()));
        self.frames += 1;

        // Scene changes occasionally so change detectors see sparse motion.
        if self.frames % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let stride = self.width as usize * 3;
        let mut pixels = vec![0u8; stride * self.height as usize];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + u64::from(self.scene_state)) % 256) as u8;
        }
        DecodedPicture {
            pixels,
            width: self.width,
            height: self.height,
            stride,
            color_format: ColorFormat::Bgr,
        }
    }
}
