//! Cabin object payload.

use image::Rgb;

use crate::annotate::{Canvas, Overlay, GRAY, RED, WHITE, YELLOW};
use crate::entity::{BoundingBox, RegionId, RegionMatch};
use crate::frame::EntityId;
use crate::output::result_log::{coord, metric, RowSchema};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObjectType {
    #[default]
    Unknown,
    Phone,
    ChildSeat,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Unknown => "UNKNOWN",
            ObjectType::Phone => "PHONE",
            ObjectType::ChildSeat => "CHILD_SEAT",
        }
    }

    pub fn color(self) -> Rgb<u8> {
        match self {
            ObjectType::Unknown => GRAY,
            ObjectType::Phone => YELLOW,
            ObjectType::ChildSeat => RED,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub object_type: ObjectType,
    pub matched_regions: Vec<RegionMatch>,
}

impl Object {
    /// Match confidence for `region`, if the object was matched to it.
    pub fn region_confidence(&self, region: RegionId) -> Option<f32> {
        self.matched_regions
            .iter()
            .find(|m| m.region_id == region)
            .map(|m| m.confidence)
    }
}

/// Object log layout: fixed columns plus one column per configured cabin region.
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    pub regions: Vec<RegionId>,
}

impl ObjectSchema {
    pub fn new(regions: Vec<RegionId>) -> Self {
        Self { regions }
    }
}

impl RowSchema for ObjectSchema {
    type Entity = Object;

    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [
            "objectId",
            "confidence",
            "upperLeftX",
            "upperLeftY",
            "lowerRightX",
            "lowerRightY",
            "ObjectType",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        columns.extend(self.regions.iter().map(|id| format!("Region {}", id)));
        columns
    }

    fn row(&self, id: EntityId, object: &Object) -> Vec<String> {
        let bbox = &object.bounding_box;
        let mut row = vec![
            id.to_string(),
            metric(object.confidence),
            coord(bbox.top_left.x),
            coord(bbox.top_left.y),
            coord(bbox.bottom_right.x),
            coord(bbox.bottom_right.y),
            object.object_type.as_str().to_string(),
        ];
        for region in &self.regions {
            row.push(match object.region_confidence(*region) {
                Some(confidence) => metric(confidence),
                None => "0".to_string(),
            });
        }
        row
    }
}

impl Overlay for Object {
    fn draw(&self, _id: EntityId, canvas: &mut Canvas) {
        canvas.rect(&self.bounding_box, self.object_type.color());
        for region in &self.matched_regions {
            canvas.polygon(&region.vertices, WHITE);
        }
    }
}
