// src/classifier.rs - per-frame check that the pose looks like the prescribed exercise
use serde::{Serialize, Serializer};

use crate::config::VerifierConfig;
use crate::exercise::ExerciseKind;
use crate::landmarks::{PoseFrame, PoseLandmark as L};

const UPRIGHT_OFFSET: f64 = 0.1;
const HORIZONTAL_OFFSET: f64 = 0.25;
const ORIENTATION_WEIGHT: f64 = 0.4;
const SPREAD_WEIGHT: f64 = 0.3;
const MOTION_BASELINE: f64 = 0.3;
const OCCLUDED_CONFIDENCE: f64 = 0.3;

/// What the classifier believes is being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedKind {
    /// The frame could not be classified at all.
    None,
    /// Confidence fell below threshold; do not count this frame.
    Unknown,
    Exercise(ExerciseKind),
}

impl DetectedKind {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            DetectedKind::None => None,
            DetectedKind::Unknown => Some("unknown"),
            DetectedKind::Exercise(kind) => Some(kind.as_str()),
        }
    }
}

impl Serialize for DetectedKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub kind: DetectedKind,
    pub confidence: f64,
}

impl Classification {
    fn rejected() -> Self {
        Self { kind: DetectedKind::None, confidence: 0.0 }
    }
}

#[derive(Debug, Clone, Copy)]
enum Orientation {
    Upright,
    Horizontal,
}

/// Horizontal separation between two landmarks that should fall in `(min, max)`.
#[derive(Debug, Clone, Copy)]
struct Spread {
    a: L,
    b: L,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, Copy)]
struct Cues {
    tracked: &'static [L],
    orientation: Orientation,
    spread: Spread,
}

const LEG_JOINTS: &[L] = &[L::LeftHip, L::RightHip, L::LeftKnee, L::RightKnee];
const PUSH_JOINTS: &[L] = &[L::LeftShoulder, L::RightShoulder, L::LeftElbow, L::RightElbow];
const ARM_JOINTS: &[L] = &[L::LeftShoulder, L::RightShoulder, L::LeftWrist, L::RightWrist];
const PLANK_JOINTS: &[L] = &[L::LeftShoulder, L::LeftHip, L::LeftAnkle];

const STANCE: Spread = Spread { a: L::LeftAnkle, b: L::RightAnkle, min: 0.08, max: 0.5 };
const SHOULDERS: Spread = Spread { a: L::LeftShoulder, b: L::RightShoulder, min: 0.08, max: 0.5 };
const BODY_LENGTH: Spread = Spread { a: L::LeftShoulder, b: L::LeftAnkle, min: 0.3, max: 1.0 };

fn cues(kind: ExerciseKind) -> Cues {
    match kind {
        ExerciseKind::Squat | ExerciseKind::Lunge | ExerciseKind::SitToStand | ExerciseKind::WallSit => {
            Cues { tracked: LEG_JOINTS, orientation: Orientation::Upright, spread: STANCE }
        }
        ExerciseKind::ShoulderRaise | ExerciseKind::FrontArmRaise => {
            Cues { tracked: ARM_JOINTS, orientation: Orientation::Upright, spread: SHOULDERS }
        }
        ExerciseKind::PushUp => {
            Cues { tracked: PUSH_JOINTS, orientation: Orientation::Horizontal, spread: BODY_LENGTH }
        }
        ExerciseKind::Plank => {
            Cues { tracked: PLANK_JOINTS, orientation: Orientation::Horizontal, spread: BODY_LENGTH }
        }
    }
}

/// Estimates whether a frame shows the target exercise.
#[derive(Debug, Clone)]
pub struct ExerciseClassifier {
    target: ExerciseKind,
    threshold: f64,
    min_visibility: f64,
}

impl ExerciseClassifier {
    pub fn new(target: ExerciseKind) -> Self {
        Self::with_config(target, &VerifierConfig::default())
    }

    pub fn with_config(target: ExerciseKind, config: &VerifierConfig) -> Self {
        Self {
            target,
            threshold: config.classifier_threshold,
            min_visibility: config.visibility.classifier,
        }
    }

    pub fn target(&self) -> ExerciseKind {
        self.target
    }

    pub fn classify(&self, frame: &PoseFrame) -> Classification {
        if !frame.is_complete() {
            return Classification::rejected();
        }

        let confidence = self.score(frame);
        if confidence > self.threshold {
            Classification { kind: DetectedKind::Exercise(self.target), confidence }
        } else {
            Classification { kind: DetectedKind::Unknown, confidence: 0.0 }
        }
    }

    /// Additive cue score in [0, 1] for the target exercise.
    fn score(&self, frame: &PoseFrame) -> f64 {
        let cues = cues(self.target);

        // Degraded tracking still earns partial credit.
        if !frame.all_visible(cues.tracked, self.min_visibility) {
            return OCCLUDED_CONFIDENCE;
        }

        let Some([shoulder, hip]) = frame.joints([L::LeftShoulder, L::LeftHip]) else {
            return OCCLUDED_CONFIDENCE;
        };
        let Some([a, b]) = frame.joints([cues.spread.a, cues.spread.b]) else {
            return OCCLUDED_CONFIDENCE;
        };

        let torso_offset = (shoulder.y - hip.y).abs();
        let oriented = match cues.orientation {
            Orientation::Upright => torso_offset > UPRIGHT_OFFSET,
            Orientation::Horizontal => torso_offset < HORIZONTAL_OFFSET,
        };
        let separation = (a.x - b.x).abs();
        let spread_ok = separation > cues.spread.min && separation < cues.spread.max;

        let mut confidence = MOTION_BASELINE;
        if oriented {
            confidence += ORIENTATION_WEIGHT;
        }
        if spread_ok {
            confidence += SPREAD_WEIGHT;
        }
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::PoseBuilder;

    #[test]
    fn standing_squat_pose_is_recognised() {
        let frame = PoseBuilder::standing().knee_angle(170.0).build(0);
        let result = ExerciseClassifier::new(ExerciseKind::Squat).classify(&frame);
        assert_eq!(result.kind, DetectedKind::Exercise(ExerciseKind::Squat));
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_frame_is_none() {
        let mut frame = PoseBuilder::standing().build(0);
        frame.landmarks.truncate(10);
        let result = ExerciseClassifier::new(ExerciseKind::Squat).classify(&frame);
        assert_eq!(result, Classification { kind: DetectedKind::None, confidence: 0.0 });
    }

    #[test]
    fn occluded_knees_fall_below_threshold() {
        let frame = PoseBuilder::standing().visibility_of(&[L::LeftKnee], 0.2).build(0);
        let classifier = ExerciseClassifier::new(ExerciseKind::Squat);
        assert_eq!(classifier.target(), ExerciseKind::Squat);
        assert_eq!(classifier.score(&frame), OCCLUDED_CONFIDENCE);
        assert_eq!(classifier.classify(&frame).kind, DetectedKind::Unknown);
    }

    #[test]
    fn standing_pose_is_not_a_plank() {
        let frame = PoseBuilder::standing().build(0);
        let result = ExerciseClassifier::new(ExerciseKind::Plank).classify(&frame);
        assert_eq!(result.kind, DetectedKind::Unknown);
    }

    #[test]
    fn horizontal_pose_is_a_plank() {
        let frame = PoseBuilder::plank().build(0);
        let result = ExerciseClassifier::new(ExerciseKind::Plank).classify(&frame);
        assert_eq!(result.kind, DetectedKind::Exercise(ExerciseKind::Plank));
    }

    #[test]
    fn detected_kind_serializes_as_string() {
        assert_eq!(serde_json::to_string(&DetectedKind::Unknown).unwrap(), "\"unknown\"");
        assert_eq!(serde_json::to_string(&DetectedKind::None).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&DetectedKind::Exercise(ExerciseKind::PushUp)).unwrap(),
            "\"pushup\""
        );
    }
}
