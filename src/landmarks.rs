// src/landmarks.rs - 33-point body skeleton shared by every analysis stage
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Number of landmarks in a complete body frame.
pub const LANDMARK_COUNT: usize = 33;

/// Fixed landmark indices. Producers and consumers must agree on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    /// The twelve large body joints used for scoring and audit export.
    pub const BODY_JOINTS: [PoseLandmark; 12] = [
        PoseLandmark::LeftShoulder,
        PoseLandmark::RightShoulder,
        PoseLandmark::LeftElbow,
        PoseLandmark::RightElbow,
        PoseLandmark::LeftWrist,
        PoseLandmark::RightWrist,
        PoseLandmark::LeftHip,
        PoseLandmark::RightHip,
        PoseLandmark::LeftKnee,
        PoseLandmark::RightKnee,
        PoseLandmark::LeftAnkle,
        PoseLandmark::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PoseLandmark::Nose => "nose",
            PoseLandmark::LeftEyeInner => "left_eye_inner",
            PoseLandmark::LeftEye => "left_eye",
            PoseLandmark::LeftEyeOuter => "left_eye_outer",
            PoseLandmark::RightEyeInner => "right_eye_inner",
            PoseLandmark::RightEye => "right_eye",
            PoseLandmark::RightEyeOuter => "right_eye_outer",
            PoseLandmark::LeftEar => "left_ear",
            PoseLandmark::RightEar => "right_ear",
            PoseLandmark::MouthLeft => "mouth_left",
            PoseLandmark::MouthRight => "mouth_right",
            PoseLandmark::LeftShoulder => "left_shoulder",
            PoseLandmark::RightShoulder => "right_shoulder",
            PoseLandmark::LeftElbow => "left_elbow",
            PoseLandmark::RightElbow => "right_elbow",
            PoseLandmark::LeftWrist => "left_wrist",
            PoseLandmark::RightWrist => "right_wrist",
            PoseLandmark::LeftPinky => "left_pinky",
            PoseLandmark::RightPinky => "right_pinky",
            PoseLandmark::LeftIndex => "left_index",
            PoseLandmark::RightIndex => "right_index",
            PoseLandmark::LeftThumb => "left_thumb",
            PoseLandmark::RightThumb => "right_thumb",
            PoseLandmark::LeftHip => "left_hip",
            PoseLandmark::RightHip => "right_hip",
            PoseLandmark::LeftKnee => "left_knee",
            PoseLandmark::RightKnee => "right_knee",
            PoseLandmark::LeftAnkle => "left_ankle",
            PoseLandmark::RightAnkle => "right_ankle",
            PoseLandmark::LeftHeel => "left_heel",
            PoseLandmark::RightHeel => "right_heel",
            PoseLandmark::LeftFootIndex => "left_foot_index",
            PoseLandmark::RightFootIndex => "right_foot_index",
        }
    }
}

/// One tracked point in normalized image space (x, y in 0..1, z relative depth).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Absent in a recording means unknown, which every gate treats as occluded.
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(index: usize, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { index, x, y, z, visibility }
    }

    pub fn xy(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_finite()
    }
}

/// A full pose snapshot captured at `timestamp_ms` (provider clock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    pub timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
}

impl PoseFrame {
    pub fn new(timestamp_ms: u64, landmarks: Vec<Landmark>) -> Self {
        Self { timestamp_ms, landmarks }
    }

    /// True when the frame carries the whole skeleton.
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if !self.is_complete() {
            return Err(FrameError::TooFewLandmarks {
                found: self.landmarks.len(),
                expected: LANDMARK_COUNT,
            });
        }
        match self.landmarks.iter().position(|lm| !lm.is_finite()) {
            Some(index) => Err(FrameError::NonFinite { index }),
            None => Ok(()),
        }
    }

    pub fn get(&self, landmark: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.get(landmark.index())
    }

    /// Visibility of a landmark, 0.0 when it is missing.
    pub fn visibility(&self, landmark: PoseLandmark) -> f64 {
        self.get(landmark).map(|lm| lm.visibility).unwrap_or(0.0)
    }

    /// Every listed landmark is present with visibility at or above `min`.
    pub fn all_visible(&self, joints: &[PoseLandmark], min: f64) -> bool {
        joints.iter().all(|j| self.visibility(*j) >= min)
    }

    /// Gathers the requested landmarks, `None` when any is missing.
    pub fn joints<const N: usize>(&self, joints: [PoseLandmark; N]) -> Option<[Landmark; N]> {
        let mut out = [Landmark::new(0, 0.0, 0.0, 0.0, 0.0); N];
        for (slot, joint) in out.iter_mut().zip(joints.iter()) {
            *slot = *self.get(*joint)?;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(count: usize) -> PoseFrame {
        let landmarks = (0..count)
            .map(|i| Landmark::new(i, 0.5, 0.5, 0.0, 0.9))
            .collect();
        PoseFrame::new(0, landmarks)
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = frame_with(20);
        assert!(!frame.is_complete());
        assert_eq!(
            frame.validate(),
            Err(FrameError::TooFewLandmarks { found: 20, expected: 33 })
        );
    }

    #[test]
    fn nan_coordinate_is_rejected() {
        let mut frame = frame_with(LANDMARK_COUNT);
        frame.landmarks[7].y = f64::NAN;
        assert_eq!(frame.validate(), Err(FrameError::NonFinite { index: 7 }));
    }

    #[test]
    fn missing_landmark_has_zero_visibility() {
        let frame = frame_with(12);
        assert_eq!(frame.visibility(PoseLandmark::LeftShoulder), 0.9);
        assert_eq!(frame.visibility(PoseLandmark::RightKnee), 0.0);
        assert!(frame.joints([PoseLandmark::LeftHip]).is_none());
    }

    #[test]
    fn visibility_defaults_to_zero_when_absent() {
        let lm: Landmark = serde_json::from_str(r#"{"index":3,"x":0.1,"y":0.2}"#).unwrap();
        assert_eq!(lm.visibility, 0.0);
        assert_eq!(lm.z, 0.0);
    }

    #[test]
    fn indices_match_shared_enumeration() {
        assert_eq!(PoseLandmark::LeftShoulder.index(), 11);
        assert_eq!(PoseLandmark::RightAnkle.index(), 28);
        assert_eq!(PoseLandmark::RightFootIndex.index(), LANDMARK_COUNT - 1);
    }
}
