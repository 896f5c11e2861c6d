//! Body payload: skeleton key points.

use std::collections::BTreeMap;

use image::Rgb;

use crate::annotate::{Canvas, Overlay};
use crate::entity::Point;
use crate::frame::EntityId;
use crate::output::result_log::{coord, RowSchema, NOT_AVAILABLE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyPoint {
    Nose,
    Neck,
    RightShoulder,
    RightElbow,
    RightWrist,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    RightHip,
    RightKnee,
    RightAnkle,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    RightEye,
    LeftEye,
    RightEar,
    LeftEar,
}

impl BodyPoint {
    /// Column order of the body log.
    pub const ALL: [BodyPoint; 18] = [
        BodyPoint::Nose,
        BodyPoint::Neck,
        BodyPoint::RightShoulder,
        BodyPoint::RightElbow,
        BodyPoint::RightWrist,
        BodyPoint::LeftShoulder,
        BodyPoint::LeftElbow,
        BodyPoint::LeftWrist,
        BodyPoint::RightHip,
        BodyPoint::RightKnee,
        BodyPoint::RightAnkle,
        BodyPoint::LeftHip,
        BodyPoint::LeftKnee,
        BodyPoint::LeftAnkle,
        BodyPoint::RightEye,
        BodyPoint::LeftEye,
        BodyPoint::RightEar,
        BodyPoint::LeftEar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BodyPoint::Nose => "nose",
            BodyPoint::Neck => "neck",
            BodyPoint::RightShoulder => "right_shoulder",
            BodyPoint::RightElbow => "right_elbow",
            BodyPoint::RightWrist => "right_wrist",
            BodyPoint::LeftShoulder => "left_shoulder",
            BodyPoint::LeftElbow => "left_elbow",
            BodyPoint::LeftWrist => "left_wrist",
            BodyPoint::RightHip => "right_hip",
            BodyPoint::RightKnee => "right_knee",
            BodyPoint::RightAnkle => "right_ankle",
            BodyPoint::LeftHip => "left_hip",
            BodyPoint::LeftKnee => "left_knee",
            BodyPoint::LeftAnkle => "left_ankle",
            BodyPoint::RightEye => "right_eye",
            BodyPoint::LeftEye => "left_eye",
            BodyPoint::RightEar => "right_ear",
            BodyPoint::LeftEar => "left_ear",
        }
    }
}

/// Skeleton edges and their colours.
const SKELETON: [(Rgb<u8>, BodyPoint, BodyPoint); 17] = [
    (Rgb([0, 0, 255]), BodyPoint::Neck, BodyPoint::RightShoulder),
    (Rgb([0, 85, 255]), BodyPoint::Neck, BodyPoint::LeftShoulder),
    (Rgb([0, 170, 255]), BodyPoint::RightShoulder, BodyPoint::RightElbow),
    (Rgb([0, 255, 255]), BodyPoint::RightElbow, BodyPoint::RightWrist),
    (Rgb([0, 255, 170]), BodyPoint::LeftShoulder, BodyPoint::LeftElbow),
    (Rgb([0, 255, 85]), BodyPoint::LeftElbow, BodyPoint::LeftWrist),
    (Rgb([0, 255, 0]), BodyPoint::Neck, BodyPoint::RightHip),
    (Rgb([85, 255, 0]), BodyPoint::RightHip, BodyPoint::RightKnee),
    (Rgb([170, 255, 0]), BodyPoint::RightKnee, BodyPoint::RightAnkle),
    (Rgb([255, 255, 0]), BodyPoint::Neck, BodyPoint::LeftHip),
    (Rgb([255, 170, 0]), BodyPoint::LeftHip, BodyPoint::LeftKnee),
    (Rgb([255, 85, 0]), BodyPoint::LeftKnee, BodyPoint::LeftAnkle),
    (Rgb([255, 0, 0]), BodyPoint::Neck, BodyPoint::Nose),
    (Rgb([255, 0, 85]), BodyPoint::Nose, BodyPoint::RightEye),
    (Rgb([255, 0, 170]), BodyPoint::RightEye, BodyPoint::RightEar),
    (Rgb([255, 0, 255]), BodyPoint::Nose, BodyPoint::LeftEye),
    (Rgb([170, 0, 255]), BodyPoint::LeftEye, BodyPoint::LeftEar),
];

/// Detected key points. Points the detector could not place are absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    pub points: BTreeMap<BodyPoint, Point>,
}

impl Body {
    pub fn draw_skeleton(&self, canvas: &mut Canvas) {
        for (color, from, to) in SKELETON {
            if let (Some(a), Some(b)) = (self.points.get(&from), self.points.get(&to)) {
                canvas.line(*a, *b, color);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BodySchema;

impl RowSchema for BodySchema {
    type Entity = Body;

    fn columns(&self) -> Vec<String> {
        let mut columns = vec!["bodyId".to_string()];
        for point in BodyPoint::ALL {
            columns.push(format!("{}_x", point.as_str()));
            columns.push(format!("{}_y", point.as_str()));
        }
        columns
    }

    fn row(&self, id: EntityId, body: &Body) -> Vec<String> {
        let mut row = vec![id.to_string()];
        for point in BodyPoint::ALL {
            match body.points.get(&point) {
                Some(p) => {
                    row.push(coord(p.x));
                    row.push(coord(p.y));
                }
                None => {
                    row.push(NOT_AVAILABLE.to_string());
                    row.push(NOT_AVAILABLE.to_string());
                }
            }
        }
        row
    }
}

impl Overlay for Body {
    fn draw(&self, _id: EntityId, canvas: &mut Canvas) {
        self.draw_skeleton(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_schema_lists_every_point() {
        let columns = BodySchema.columns();
        assert_eq!(columns.len(), 37);
        assert_eq!(columns[1], "nose_x");
        assert_eq!(columns[36], "left_ear_y");
    }

    #[test]
    fn absent_points_render_nan_pairs() {
        let mut body = Body::default();
        body.points.insert(BodyPoint::Neck, Point::new(100.4, 50.7));
        let row = BodySchema.row(9, &body);
        assert_eq!(row.len(), 37);
        assert_eq!(&row[..5], &["9", "nan", "nan", "100", "51"]);
        assert!(row[5..].iter().all(|v| v == "nan"));
    }
}
