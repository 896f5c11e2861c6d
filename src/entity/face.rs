//! Face payload: box, landmarks and per-face affect metrics.

use crate::annotate::{red_green, Canvas, Overlay, GREEN, RED, WHITE};
use crate::entity::{BoundingBox, Point};
use crate::frame::EntityId;
use crate::output::result_log::{coord, metric, RowSchema, NOT_AVAILABLE};

/// Valence spans -100..100; the box colour ramps red to green across it.
const VALENCE_RANGE: (f32, f32) = (-100.0, 100.0);
/// Vertical distance between two metric meters.
const METER_SPACING: f32 = 20.0;
const UNKNOWN: &str = "UNKNOWN";

pub const HEAD_ANGLE_NAMES: [&str; 3] = ["pitch", "yaw", "roll"];

pub const EMOTION_NAMES: [&str; 9] = [
    "joy", "anger", "surprise", "valence", "fear", "sadness", "disgust", "neutral", "contempt",
];

pub const EXPRESSION_NAMES: [&str; 14] = [
    "smile",
    "browRaise",
    "browFurrow",
    "noseWrinkle",
    "upperLipRaise",
    "mouthOpen",
    "eyeClosure",
    "cheekRaise",
    "yawn",
    "blink",
    "blinkRate",
    "eyeWiden",
    "innerBrowRaise",
    "lipCornerDepressor",
];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeadAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl HeadAngles {
    pub fn values(&self) -> [f32; 3] {
        [self.pitch, self.yaw, self.roll]
    }
}

/// Emotion scores, 0..100 except valence (-100..100).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Emotions {
    pub joy: f32,
    pub anger: f32,
    pub surprise: f32,
    pub valence: f32,
    pub fear: f32,
    pub sadness: f32,
    pub disgust: f32,
    pub neutral: f32,
    pub contempt: f32,
}

impl Emotions {
    /// Scores in `EMOTION_NAMES` order.
    pub fn values(&self) -> [f32; 9] {
        [
            self.joy,
            self.anger,
            self.surprise,
            self.valence,
            self.fear,
            self.sadness,
            self.disgust,
            self.neutral,
            self.contempt,
        ]
    }
}

/// Expression scores, 0..100. `blink` is 0 or 1; `blink_rate` is blinks per minute.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Expressions {
    pub smile: f32,
    pub brow_raise: f32,
    pub brow_furrow: f32,
    pub nose_wrinkle: f32,
    pub upper_lip_raise: f32,
    pub mouth_open: f32,
    pub eye_closure: f32,
    pub cheek_raise: f32,
    pub yawn: f32,
    pub blink: f32,
    pub blink_rate: f32,
    pub eye_widen: f32,
    pub inner_brow_raise: f32,
    pub lip_corner_depressor: f32,
}

impl Expressions {
    /// Scores in `EXPRESSION_NAMES` order.
    pub fn values(&self) -> [f32; 14] {
        [
            self.smile,
            self.brow_raise,
            self.brow_furrow,
            self.nose_wrinkle,
            self.upper_lip_raise,
            self.mouth_open,
            self.eye_closure,
            self.cheek_raise,
            self.yawn,
            self.blink,
            self.blink_rate,
            self.eye_widen,
            self.inner_brow_raise,
            self.lip_corner_depressor,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mood {
    #[default]
    Unknown,
    Neutral,
    Negative,
    Positive,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Unknown => "UNKNOWN",
            Mood::Neutral => "NEUTRAL",
            Mood::Negative => "NEGATIVE",
            Mood::Positive => "POSITIVE",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DominantEmotion {
    #[default]
    Unknown,
    Neutral,
    Joy,
    Anger,
    Surprise,
    Sadness,
    Disgust,
    Fear,
}

impl DominantEmotion {
    pub fn as_str(self) -> &'static str {
        match self {
            DominantEmotion::Unknown => "unknown",
            DominantEmotion::Neutral => "neutral",
            DominantEmotion::Joy => "joy",
            DominantEmotion::Anger => "anger",
            DominantEmotion::Surprise => "surprise",
            DominantEmotion::Sadness => "sadness",
            DominantEmotion::Disgust => "disgust",
            DominantEmotion::Fear => "fear",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gaze {
    #[default]
    Unknown,
    Left,
    Right,
    UpRight,
    Forward,
    ForwardDown,
    Down,
}

impl Gaze {
    pub fn as_str(self) -> &'static str {
        match self {
            Gaze::Unknown => "UNKNOWN",
            Gaze::Left => "LEFT",
            Gaze::Right => "RIGHT",
            Gaze::UpRight => "UP_RIGHT",
            Gaze::Forward => "FORWARD",
            Gaze::ForwardDown => "FORWARD_DOWN",
            Gaze::Down => "DOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgeCategory {
    #[default]
    Unknown,
    Baby,
    Child,
    Teen,
    Adult,
}

impl AgeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AgeCategory::Unknown => "UNKNOWN",
            AgeCategory::Baby => "BABY",
            AgeCategory::Child => "CHILD",
            AgeCategory::Teen => "TEEN",
            AgeCategory::Adult => "ADULT",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrowsinessLevel {
    #[default]
    Unknown,
    None,
    Mild,
    Moderate,
    Severe,
}

impl DrowsinessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            DrowsinessLevel::Unknown => "UNKNOWN",
            DrowsinessLevel::None => "NONE",
            DrowsinessLevel::Mild => "MILD",
            DrowsinessLevel::Moderate => "MODERATE",
            DrowsinessLevel::Severe => "SEVERE",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drowsiness {
    pub level: DrowsinessLevel,
    pub confidence: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Face {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub interocular_distance: f32,
    pub head_angles: HeadAngles,
    pub emotions: Emotions,
    pub expressions: Expressions,
    pub mood: Mood,
    pub dominant_emotion: DominantEmotion,
    pub dominant_emotion_confidence: f32,
    pub gaze: Gaze,
    pub gaze_confidence: f32,
    /// `None` when the face is not enrolled.
    pub identity: Option<u32>,
    pub identity_confidence: f32,
    /// Estimated age in years, `None` when unknown.
    pub age: Option<u32>,
    pub age_confidence: f32,
    pub age_category: AgeCategory,
    pub glasses: f32,
    pub drowsiness: Option<Drowsiness>,
    pub landmarks: Vec<Point>,
}

/// Face log layout. The drowsiness pair is only present when enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceSchema {
    pub drowsiness: bool,
}

impl FaceSchema {
    pub fn with_drowsiness() -> Self {
        Self { drowsiness: true }
    }
}

impl RowSchema for FaceSchema {
    type Entity = Face;

    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [
            "faceId",
            "upperLeftX",
            "upperLeftY",
            "lowerRightX",
            "lowerRightY",
            "confidence",
            "interocularDistance",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        columns.extend(HEAD_ANGLE_NAMES.iter().map(|c| c.to_string()));
        columns.extend(EMOTION_NAMES.iter().map(|c| c.to_string()));
        columns.extend(EXPRESSION_NAMES.iter().map(|c| c.to_string()));
        columns.extend(
            [
                "mood",
                "dominantEmotion",
                "dominantEmotionConfidence",
                "gazeRegion",
                "gazeConfidence",
                "identity",
                "identityConfidence",
                "age",
                "ageConfidence",
                "ageCategory",
                "glasses",
            ]
            .iter()
            .map(|c| c.to_string()),
        );
        if self.drowsiness {
            columns.push("drowsinessLevel".into());
            columns.push("drowsinessConfidence".into());
        }
        columns
    }

    fn row(&self, id: EntityId, face: &Face) -> Vec<String> {
        let bbox = &face.bounding_box;
        let mut row = vec![
            id.to_string(),
            coord(bbox.top_left.x),
            coord(bbox.top_left.y),
            coord(bbox.bottom_right.x),
            coord(bbox.bottom_right.y),
            metric(face.confidence),
            metric(face.interocular_distance),
        ];
        row.extend(face.head_angles.values().into_iter().map(metric));
        row.extend(face.emotions.values().into_iter().map(metric));
        row.extend(face.expressions.values().into_iter().map(metric));
        row.push(face.mood.as_str().to_string());
        row.push(face.dominant_emotion.as_str().to_string());
        row.push(metric(face.dominant_emotion_confidence));
        row.push(face.gaze.as_str().to_string());
        row.push(metric(face.gaze_confidence));
        row.push(known_or_unknown(face.identity));
        row.push(metric(face.identity_confidence));
        row.push(known_or_unknown(face.age));
        row.push(metric(face.age_confidence));
        row.push(face.age_category.as_str().to_string());
        row.push(metric(face.glasses));
        if self.drowsiness {
            match face.drowsiness {
                Some(drowsiness) => {
                    row.push(drowsiness.level.as_str().to_string());
                    row.push(metric(drowsiness.confidence));
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

fn known_or_unknown(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn classifier_color(name: &str, value: f32) -> image::Rgb<u8> {
    match name {
        "valence" => red_green(value, VALENCE_RANGE.0, VALENCE_RANGE.1),
        "anger" => RED,
        "joy" => GREEN,
        _ => WHITE,
    }
}

impl Overlay for Face {
    fn draw(&self, _id: EntityId, canvas: &mut Canvas) {
        let bbox = &self.bounding_box;
        canvas.rect(
            bbox,
            red_green(self.emotions.valence, VALENCE_RANGE.0, VALENCE_RANGE.1),
        );
        for point in &self.landmarks {
            canvas.circle(*point, 2, WHITE);
        }

        // Expressions to the right of the box.
        let mut y = bbox.top_left.y;
        for (name, value) in EXPRESSION_NAMES.iter().zip(self.expressions.values()) {
            y += METER_SPACING;
            // Blink rate is a count, not a level.
            if *name == "blinkRate" {
                continue;
            }
            let level = if *name == "blink" { value * 100.0 } else { value };
            canvas.equalizer(Point::new(bbox.bottom_right.x, y), level, false, WHITE);
        }

        // Emotions to the left of the box, growing outward.
        let mut y = bbox.top_left.y;
        for (name, value) in EMOTION_NAMES.iter().zip(self.emotions.values()) {
            y += METER_SPACING;
            let level = if *name == "valence" { value.abs() } else { value };
            canvas.equalizer(
                Point::new(bbox.top_left.x, y),
                level,
                true,
                classifier_color(name, value),
            );
        }
    }
}
