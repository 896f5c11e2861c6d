use super::camera::{CameraConfig, CameraSource};
use super::file::{check_extension, SampledFrameSource, SourceError};
use crate::frame::Frame;

/// Frame supply for the processing loop.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted or stopped delivering.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Frames the source expects to deliver. 0 when unknown or unbounded.
    fn total_frame_count(&self) -> u64;

    /// Frames read so far, including any dropped by sampling.
    fn current_frame(&self) -> u64;
}

impl FrameSource for SampledFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        SampledFrameSource::next_frame(self)
    }

    fn total_frame_count(&self) -> u64 {
        SampledFrameSource::total_frame_count(self)
    }

    fn current_frame(&self) -> u64 {
        SampledFrameSource::current_frame(self)
    }
}

/// Where a run reads its frames from.
#[derive(Clone, Debug, PartialEq)]
pub enum InputSource {
    /// Video file re-sampled to `sampling_fps` (0 passes every frame through).
    File { path: String, sampling_fps: u32 },
    /// Live camera. Every captured frame is processed.
    Camera(CameraConfig),
}

impl InputSource {
    pub fn file(path: &str, sampling_fps: u32) -> Self {
        InputSource::File {
            path: path.to_string(),
            sampling_fps,
        }
    }

    /// Checks that need no device or file handle, such as the extension allow-list.
    pub fn check(&self) -> Result<(), SourceError> {
        match self {
            InputSource::File { path, .. } => check_extension(path),
            InputSource::Camera(_) => Ok(()),
        }
    }

    pub fn open(&self) -> Result<Box<dyn FrameSource>, SourceError> {
        match self {
            InputSource::File { path, sampling_fps } => {
                Ok(Box::new(SampledFrameSource::open(path, *sampling_fps)?))
            }
            InputSource::Camera(config) => Ok(Box::new(CameraSource::open(config)?)),
        }
    }

    /// Files can be replayed from the start; a camera cannot.
    pub fn is_replayable(&self) -> bool {
        matches!(self, InputSource::File { .. })
    }

    /// File path or camera device, for logs and the default log file name.
    pub fn name(&self) -> &str {
        match self {
            InputSource::File { path, .. } => path,
            InputSource::Camera(config) => &config.device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_input_checks_extension_without_opening() {
        assert!(InputSource::file("/no/such/clip.mp4", 0).check().is_ok());
        assert!(matches!(
            InputSource::file("/no/such/clip.mkv", 0).check(),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn only_files_are_replayable() {
        let file = InputSource::file("stub://clip.mp4", 10);
        let camera = InputSource::Camera(CameraConfig::stub("cabin"));
        assert!(file.is_replayable());
        assert!(!camera.is_replayable());
        assert_eq!(camera.name(), "stub://cabin");
        assert!(camera.check().is_ok());
    }

    #[test]
    fn opened_sources_report_progress() {
        let mut source = InputSource::file("stub://clip.mp4", 0).open().unwrap();
        assert_eq!(source.total_frame_count(), 90);
        assert!(source.next_frame().is_some());
        assert_eq!(source.current_frame(), 1);
    }
}
