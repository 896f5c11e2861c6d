//! Occupant payload: a person matched to a cabin seat region.

use image::Rgb;

use crate::annotate::{Canvas, Overlay, WHITE};
use crate::entity::{Body, BoundingBox, RegionId, RegionMatch, REGION_UNKNOWN};
use crate::frame::EntityId;
use crate::output::result_log::{coord, metric, RowSchema};

const OCCUPANT_COLOR: Rgb<u8> = Rgb([255, 110, 199]);

#[derive(Clone, Debug, PartialEq)]
pub struct Occupant {
    pub bounding_box: BoundingBox,
    pub matched_seat: RegionMatch,
    /// Skeleton, when body tracking ran for this occupant.
    pub body: Option<Body>,
}

impl Default for Occupant {
    fn default() -> Self {
        Self {
            bounding_box: BoundingBox::default(),
            matched_seat: RegionMatch::new(REGION_UNKNOWN, 0.0),
            body: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OccupantSchema {
    pub regions: Vec<RegionId>,
}

impl OccupantSchema {
    pub fn new(regions: Vec<RegionId>) -> Self {
        Self { regions }
    }
}

impl RowSchema for OccupantSchema {
    type Entity = Occupant;

    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [
            "occupantId",
            "confidence",
            "regionId",
            "upperLeftX",
            "upperLeftY",
            "lowerRightX",
            "lowerRightY",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        columns.extend(self.regions.iter().map(|id| format!("Region {}", id)));
        columns
    }

    fn row(&self, id: EntityId, occupant: &Occupant) -> Vec<String> {
        let bbox = &occupant.bounding_box;
        let seat = &occupant.matched_seat;
        let mut row = vec![
            id.to_string(),
            metric(seat.confidence),
            seat.region_id.to_string(),
            coord(bbox.top_left.x),
            coord(bbox.top_left.y),
            coord(bbox.bottom_right.x),
            coord(bbox.bottom_right.y),
        ];
        for region in &self.regions {
            row.push(if *region == seat.region_id {
                metric(seat.confidence)
            } else {
                "0".to_string()
            });
        }
        row
    }
}

impl Overlay for Occupant {
    fn draw(&self, _id: EntityId, canvas: &mut Canvas) {
        canvas.rect(&self.bounding_box, OCCUPANT_COLOR);
        if let Some(body) = &self.body {
            body.draw_skeleton(canvas);
        }
        if self.matched_seat.region_id != REGION_UNKNOWN {
            canvas.polygon(&self.matched_seat.vertices, WHITE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ResultSet;
    use crate::output::result_log::serialize;

    #[test]
    fn seat_confidence_fills_its_region_column() {
        let schema = OccupantSchema::new(vec![0, 3, 5]);
        let occupant = Occupant {
            bounding_box: BoundingBox::new(5.0, 6.0, 50.0, 60.0),
            matched_seat: RegionMatch::new(3, 0.8125),
            body: None,
        };
        let row = schema.row(2, &occupant);
        assert_eq!(
            row,
            vec!["2", "0.8125", "3", "5", "6", "50", "60", "0", "0.8125", "0"]
        );
    }

    #[test]
    fn empty_set_row_matches_header_width() {
        let schema = OccupantSchema::new(vec![1, 2]);
        let rows = serialize(&schema, &ResultSet::new(), 10.0);
        assert_eq!(rows[0].len(), schema.columns().len() + 1);
        assert_eq!(rows[0][0], "10.00");
    }
}
