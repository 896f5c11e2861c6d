//! Destinations for annotated frames.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

/// Receives one annotated frame per processed input frame.
pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes annotated frames as numbered image files (`frame_000000.jpg`, ...).
///
/// The playback rate is recorded alongside so the sequence can be re-encoded later.
pub struct ImageSequenceSink {
    dir: PathBuf,
    extension: &'static str,
    fps: u32,
    width: u32,
    height: u32,
    written: u64,
}

impl ImageSequenceSink {
    /// `fps` is the sampling rate, or the probed rate when sampling is disabled.
    pub fn create(dir: &Path, fps: u32, width: u32, height: u32) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: "jpg",
            fps,
            width,
            height,
            written: 0,
        })
    }

    /// Lossless PNG frames instead of JPEG.
    pub fn lossless(mut self) -> Self {
        self.extension = "png";
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.{}", index, self.extension))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if image.width() != self.width || image.height() != self.height {
            return Err(anyhow!(
                "annotated frame is {}x{}, output expects {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            ));
        }
        let path = self.frame_path(self.written);
        image
            .save(&path)
            .with_context(|| format!("write annotated frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let meta = serde_json::json!({
            "fps": self.fps,
            "width": self.width,
            "height": self.height,
            "frames": self.written,
            "pattern": format!("frame_%06d.{}", self.extension),
        });
        let path = self.dir.join("sequence.json");
        fs::write(&path, serde_json::to_vec_pretty(&meta)?)
            .with_context(|| format!("write {}", path.display()))?;
        log::info!(
            "wrote {} annotated frames to {} at {} fps",
            self.written,
            self.dir.display(),
            self.fps
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_numbered_frames_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path(), 15, 4, 3).unwrap().lossless();
        let image = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        sink.write_frame(&image).unwrap();
        sink.write_frame(&image).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000001.png").exists());
        let meta: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("sequence.json")).unwrap()).unwrap();
        assert_eq!(meta["fps"], 15);
        assert_eq!(meta["frames"], 2);
    }

    #[test]
    fn rejects_resolution_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path(), 30, 4, 3).unwrap();
        let image = RgbImage::new(8, 3);
        assert!(sink.write_frame(&image).is_err());
        assert_eq!(sink.frames_written(), 0);
    }
}
