use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::entity::{BoundingBox, Object, ObjectType};
use crate::frame::{EntityId, Frame, ResultSet};

/// Entity id of the whole-frame motion object.
pub const MOTION_ENTITY_ID: EntityId = 0;

const MOTION_CONFIDENCE: f32 = 0.85;

/// Frame-change detector. Hashes each frame and reports an object covering the frame
/// whenever the picture differs from the previous one.
#[derive(Default)]
pub struct MotionBackend {
    last_hash: Option<[u8; 32]>,
}

impl MotionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetectorBackend<Object> for MotionBackend {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, frame: &Frame) -> Result<ResultSet<Object>> {
        let mut hasher = Sha256::new();
        for y in 0..frame.height {
            hasher.update(frame.row(y));
        }
        let current_hash: [u8; 32] = hasher.finalize().into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        let mut results = ResultSet::new();
        if motion {
            results.insert(
                MOTION_ENTITY_ID,
                Object {
                    bounding_box: BoundingBox::full_frame(frame.width, frame.height),
                    confidence: MOTION_CONFIDENCE,
                    object_type: ObjectType::Unknown,
                    matched_regions: Vec::new(),
                },
            );
        }
        Ok(results)
    }

    fn reset(&mut self) {
        self.last_hash = None;
    }
}
