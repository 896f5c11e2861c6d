//! Scripted decoder used for `stub://` inputs and tests.
//!
//! The script is a list of low-level decode outcomes. It lets callers reproduce the
//! awkward decoder behaviours the sampled source has to cope with: a corrupt frame in
//! the middle of a file, and a decoder that hands back the previous picture instead of
//! advancing.

use std::collections::VecDeque;

use super::DecodedPicture;
use crate::frame::ColorFormat;

/// Outcome of one low-level decode attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticStep {
    /// A good frame presented at the given millisecond position.
    Frame(i64),
    /// Decode failure; nothing is returned and the position is unchanged.
    Corrupt,
    /// A picture is returned but the position does not advance.
    Stale,
    /// A picture at the given position whose buffer is too short for its size.
    Malformed(i64),
}

pub struct SyntheticDecoder {
    width: u32,
    height: u32,
    steps: VecDeque<SyntheticStep>,
    position_ms: i64,
    frame_count: u64,
    decoded: u64,
    scene_state: u8,
}

impl SyntheticDecoder {
    /// Evenly spaced frames at `fps`, timestamps truncated to whole milliseconds.
    pub fn constant_rate(width: u32, height: u32, fps: u32, frames: u64) -> Self {
        let fps = i64::from(fps.max(1));
        let steps = (0..frames as i64)
            .map(|i| SyntheticStep::Frame(i * 1000 / fps))
            .collect();
        Self::from_steps(width, height, steps)
    }

    pub fn from_steps(width: u32, height: u32, steps: Vec<SyntheticStep>) -> Self {
        let frame_count = steps
            .iter()
            .filter(|step| matches!(step, SyntheticStep::Frame(_) | SyntheticStep::Malformed(_)))
            .count() as u64;
        Self {
            width,
            height,
            steps: steps.into(),
            position_ms: 0,
            frame_count,
            decoded: 0,
            scene_state: 0,
        }
    }

    pub(crate) fn grab(&mut self) -> Option<DecodedPicture> {
        match self.steps.pop_front()? {
            SyntheticStep::Frame(ts) => {
                self.position_ms = ts;
                Some(self.picture())
            }
            SyntheticStep::Corrupt => None,
            SyntheticStep::Stale => Some(self.picture()),
            SyntheticStep::Malformed(ts) => {
                self.position_ms = ts;
                let mut picture = self.picture();
                picture.pixels.truncate(picture.stride);
                Some(picture)
            }
        }
    }

    pub(crate) fn position_ms(&self) -> i64 {
        self.position_ms
    }

    pub(crate) fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn picture(&mut self) -> DecodedPicture {
        self.decoded += 1;
        // Scene changes every 15 pictures so change detectors see sparse motion.
        if self.decoded % 15 == 0 {
            self.scene_state = self.scene_state.wrapping_add(37);
        }
        let stride = self.width as usize * 3;
        let mut pixels = vec![0u8; stride * self.height as usize];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64) % 256) as u8;
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
