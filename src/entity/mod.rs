//! Detector payload types and their per-type log/overlay strategies.
//!
//! Each payload module pairs the value type with a `RowSchema` (CSV columns) and an
//! `Overlay` implementation. The synchronizer itself is generic and never looks inside.

pub mod body;
pub mod face;
pub mod object;
pub mod occupant;

use std::fmt;
use std::str::FromStr;

pub use body::{Body, BodyPoint, BodySchema};
pub use face::{AgeCategory, DominantEmotion, Face, FaceSchema, Gaze, Mood};
pub use object::{Object, ObjectSchema, ObjectType};
pub use occupant::{Occupant, OccupantSchema};

/// Pixel coordinate in frame space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box given by its top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            top_left: Point::new(x0, y0),
            bottom_right: Point::new(x1, y1),
        }
    }

    /// Box covering a whole `width` x `height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32 - 1.0, height as f32 - 1.0)
    }

    pub fn width(&self) -> f32 {
        (self.bottom_right.x - self.top_left.x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom_right.y - self.top_left.y).max(0.0)
    }
}

/// Cabin region identifier. Configured regions have non-negative ids.
pub type RegionId = i32;

/// Region id reported when a match has no known region.
pub const REGION_UNKNOWN: RegionId = -1;

/// Match between an entity and a configured cabin region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionMatch {
    pub region_id: RegionId,
    pub confidence: f32,
    /// Region outline, empty when the detector does not report it.
    pub vertices: Vec<Point>,
}

impl RegionMatch {
    pub fn new(region_id: RegionId, confidence: f32) -> Self {
        Self {
            region_id,
            confidence,
            vertices: Vec::new(),
        }
    }
}

/// Which payload type a run processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Face,
    Body,
    Object,
    Occupant,
}

impl EntityKind {
    /// Suffix for the default log file name, `<stem>_<suffix>.csv`.
    pub fn log_suffix(self) -> &'static str {
        match self {
            EntityKind::Face => "faces",
            EntityKind::Body => "bodies",
            EntityKind::Object => "objects",
            EntityKind::Occupant => "occupants",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Face => "face",
            EntityKind::Body => "body",
            EntityKind::Object => "object",
            EntityKind::Occupant => "occupant",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" | "faces" => Ok(EntityKind::Face),
            "body" | "bodies" => Ok(EntityKind::Body),
            "object" | "objects" => Ok(EntityKind::Object),
            "occupant" | "occupants" => Ok(EntityKind::Occupant),
            other => Err(anyhow::anyhow!("unknown entity kind '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("Body".parse::<EntityKind>().unwrap(), EntityKind::Body);
        assert_eq!("occupants".parse::<EntityKind>().unwrap(), EntityKind::Occupant);
        assert!("vehicle".parse::<EntityKind>().is_err());
        assert_eq!(EntityKind::Body.log_suffix(), "bodies");
    }

    #[test]
    fn full_frame_box_spans_pixels() {
        let bbox = BoundingBox::full_frame(320, 240);
        assert_eq!(bbox.width(), 319.0);
        assert_eq!(bbox.height(), 239.0);
    }
}
