// src/simulate.rs - synthetic skeletons for demos and tests
use std::f64::consts::PI;

use crate::exercise::ExerciseKind;
use crate::landmarks::{Landmark, PoseFrame, PoseLandmark as L, LANDMARK_COUNT};

const THIGH: f64 = 0.2;
const SHIN: f64 = 0.2;
const UPPER_ARM: f64 = 0.15;
const FOREARM: f64 = 0.15;
const DEFAULT_VISIBILITY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Posture {
    Standing,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Arms {
    Down,
    Side(f64),
    Front(f64),
}

/// Builds a complete 33-point frame from a handful of joint targets.
///
/// Standing poses face the camera; horizontal poses are seen from the side
/// with the right half of the body offset so both sides stay distinguishable.
#[derive(Debug, Clone)]
pub struct PoseBuilder {
    posture: Posture,
    left_knee: f64,
    right_knee: f64,
    elbow: f64,
    arms: Arms,
    visibility: f64,
    overrides: Vec<(L, f64)>,
}

impl PoseBuilder {
    pub fn standing() -> Self {
        Self {
            posture: Posture::Standing,
            left_knee: 175.0,
            right_knee: 175.0,
            elbow: 170.0,
            arms: Arms::Down,
            visibility: DEFAULT_VISIBILITY,
            overrides: Vec::new(),
        }
    }

    pub fn plank() -> Self {
        Self {
            posture: Posture::Horizontal,
            elbow: 90.0,
            ..Self::standing()
        }
    }

    pub fn push_up(elbow_angle: f64) -> Self {
        Self {
            posture: Posture::Horizontal,
            elbow: elbow_angle,
            ..Self::standing()
        }
    }

    /// Same knee angle on both legs.
    pub fn knee_angle(self, degrees: f64) -> Self {
        self.knee_angles(degrees, degrees)
    }

    pub fn knee_angles(mut self, left: f64, right: f64) -> Self {
        self.left_knee = left;
        self.right_knee = right;
        self
    }

    pub fn elbow_angle(mut self, degrees: f64) -> Self {
        self.elbow = degrees;
        self
    }

    /// Arms abducted sideways with wrists `lift` above the shoulders.
    pub fn side_raise(mut self, lift: f64) -> Self {
        self.arms = Arms::Side(lift);
        self
    }

    /// Arms raised forward, wrists close together in front of the body.
    pub fn front_raise(mut self, lift: f64) -> Self {
        self.arms = Arms::Front(lift);
        self
    }

    pub fn visibility(mut self, visibility: f64) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn visibility_of(mut self, joints: &[L], visibility: f64) -> Self {
        self.overrides.extend(joints.iter().map(|j| (*j, visibility)));
        self
    }

    pub fn build(&self, timestamp_ms: u64) -> PoseFrame {
        let mut points = [(0.0_f64, 0.0_f64, 0.0_f64); LANDMARK_COUNT];
        match self.posture {
            Posture::Standing => self.place_standing(&mut points),
            Posture::Horizontal => self.place_horizontal(&mut points),
        }

        let landmarks = points
            .iter()
            .enumerate()
            .map(|(index, (x, y, z))| Landmark::new(index, *x, *y, *z, self.visibility))
            .collect();
        let mut frame = PoseFrame::new(timestamp_ms, landmarks);
        for (joint, visibility) in &self.overrides {
            frame.landmarks[joint.index()].visibility = *visibility;
        }
        frame
    }

    fn place_standing(&self, p: &mut [(f64, f64, f64); LANDMARK_COUNT]) {
        place_face(p, 0.5, 0.1);

        let sides = [
            (1.0, self.left_knee, Side::LEFT),
            (-1.0, self.right_knee, Side::RIGHT),
        ];
        for (sign, knee_angle, side) in sides {
            let shoulder = (0.5 + sign * 0.1, 0.25);
            let hip = (0.5 + sign * 0.07, 0.5);
            p[side.shoulder.index()] = (shoulder.0, shoulder.1, 0.0);
            p[side.hip.index()] = (hip.0, hip.1, 0.0);

            // Shin stays vertical; the thigh swings outward as the knee bends.
            let theta = knee_angle.to_radians();
            let knee = (hip.0 + sign * THIGH * theta.sin(), hip.1 - THIGH * theta.cos());
            let ankle = (knee.0, knee.1 + SHIN);
            p[side.knee.index()] = (knee.0, knee.1, 0.0);
            p[side.ankle.index()] = (ankle.0, ankle.1, 0.0);
            p[side.heel.index()] = (ankle.0, ankle.1 + 0.02, 0.02);
            p[side.foot.index()] = (ankle.0 + sign * 0.02, ankle.1 + 0.03, -0.05);

            let (elbow, wrist) = match self.arms {
                Arms::Down => (
                    (shoulder.0 + sign * 0.02, shoulder.1 + 0.15, 0.0),
                    (shoulder.0 + sign * 0.03, shoulder.1 + 0.3, 0.0),
                ),
                Arms::Side(lift) => {
                    let wrist = (shoulder.0 + sign * 0.3, shoulder.1 - lift, 0.0);
                    (midpoint(shoulder, wrist), wrist)
                }
                Arms::Front(lift) => {
                    let wrist = (0.5 + sign * 0.04, shoulder.1 - lift, -0.3);
                    (midpoint(shoulder, wrist), wrist)
                }
            };
            p[side.elbow.index()] = elbow;
            p[side.wrist.index()] = wrist;
            place_hand(p, side, wrist, sign);
        }
    }

    fn place_horizontal(&self, p: &mut [(f64, f64, f64); LANDMARK_COUNT]) {
        place_face(p, 0.1, 0.48);

        let sides = [(0.0, Side::LEFT), (0.16, Side::RIGHT)];
        for (offset, side) in sides {
            let shoulder = (0.2 + offset, 0.5);
            p[side.shoulder.index()] = (shoulder.0, shoulder.1, 0.0);
            p[side.hip.index()] = (0.4 + offset, 0.52, 0.0);
            p[side.knee.index()] = (0.55 + offset, 0.535, 0.0);
            p[side.ankle.index()] = (0.7 + offset, 0.55, 0.0);
            p[side.heel.index()] = (0.72 + offset, 0.55, 0.0);
            p[side.foot.index()] = (0.7 + offset, 0.58, 0.0);

            // Forearm stays vertical; the upper arm folds back toward the hips.
            let theta = self.elbow.to_radians();
            let elbow = (
                shoulder.0 + UPPER_ARM * theta.sin(),
                shoulder.1 - UPPER_ARM * theta.cos(),
                0.0,
            );
            let wrist = (elbow.0, elbow.1 + FOREARM, 0.0);
            p[side.elbow.index()] = elbow;
            p[side.wrist.index()] = wrist;
            place_hand(p, side, wrist, -1.0);
        }
    }
}

struct Side {
    shoulder: L,
    elbow: L,
    wrist: L,
    pinky: L,
    index: L,
    thumb: L,
    hip: L,
    knee: L,
    ankle: L,
    heel: L,
    foot: L,
}

impl Side {
    const LEFT: Side = Side {
        shoulder: L::LeftShoulder,
        elbow: L::LeftElbow,
        wrist: L::LeftWrist,
        pinky: L::LeftPinky,
        index: L::LeftIndex,
        thumb: L::LeftThumb,
        hip: L::LeftHip,
        knee: L::LeftKnee,
        ankle: L::LeftAnkle,
        heel: L::LeftHeel,
        foot: L::LeftFootIndex,
    };

    const RIGHT: Side = Side {
        shoulder: L::RightShoulder,
        elbow: L::RightElbow,
        wrist: L::RightWrist,
        pinky: L::RightPinky,
        index: L::RightIndex,
        thumb: L::RightThumb,
        hip: L::RightHip,
        knee: L::RightKnee,
        ankle: L::RightAnkle,
        heel: L::RightHeel,
        foot: L::RightFootIndex,
    };
}

fn midpoint(a: (f64, f64), b: (f64, f64, f64)) -> (f64, f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0, b.2 / 2.0)
}

fn place_face(p: &mut [(f64, f64, f64); LANDMARK_COUNT], x: f64, y: f64) {
    let offsets = [
        (L::Nose, 0.0, 0.0),
        (L::LeftEyeInner, 0.01, -0.02),
        (L::LeftEye, 0.02, -0.02),
        (L::LeftEyeOuter, 0.03, -0.02),
        (L::RightEyeInner, -0.01, -0.02),
        (L::RightEye, -0.02, -0.02),
        (L::RightEyeOuter, -0.03, -0.02),
        (L::LeftEar, 0.05, -0.01),
        (L::RightEar, -0.05, -0.01),
        (L::MouthLeft, 0.015, 0.03),
        (L::MouthRight, -0.015, 0.03),
    ];
    for (landmark, dx, dy) in offsets {
        p[landmark.index()] = (x + dx, y + dy, -0.1);
    }
}

fn place_hand(p: &mut [(f64, f64, f64); LANDMARK_COUNT], side: Side, wrist: (f64, f64, f64), sign: f64) {
    p[side.pinky.index()] = (wrist.0 + sign * 0.01, wrist.1 + 0.03, wrist.2);
    p[side.index.index()] = (wrist.0, wrist.1 + 0.035, wrist.2);
    p[side.thumb.index()] = (wrist.0 - sign * 0.01, wrist.1 + 0.02, wrist.2);
}

/// A plausible recording of `kind` at `fps`, two seconds per repetition.
pub fn session_frames(kind: ExerciseKind, count: usize, fps: f64) -> Vec<PoseFrame> {
    let period = (2.0 * fps).max(1.0);
    let frame_ms = 1000.0 / fps.max(1.0);

    (0..count)
        .map(|i| {
            // Starts extended, bottoms out half a period later.
            let phase = (2.0 * PI * i as f64 / period).cos();
            let timestamp_ms = (i as f64 * frame_ms).round() as u64;
            pose_for(kind, phase).build(timestamp_ms)
        })
        .collect()
}

/// `phase` runs from 1.0 (top of the movement) to -1.0 (bottom).
fn pose_for(kind: ExerciseKind, phase: f64) -> PoseBuilder {
    let bend = 130.0 + 45.0 * phase;
    let lift = 0.1 - 0.2 * phase;
    match kind {
        ExerciseKind::Squat | ExerciseKind::SitToStand => PoseBuilder::standing().knee_angle(bend),
        ExerciseKind::Lunge => PoseBuilder::standing().knee_angles(bend, 175.0),
        ExerciseKind::PushUp => PoseBuilder::push_up(125.0 + 45.0 * phase),
        ExerciseKind::ShoulderRaise => PoseBuilder::standing().side_raise(lift),
        ExerciseKind::FrontArmRaise => PoseBuilder::standing().front_raise(lift),
        ExerciseKind::Plank => PoseBuilder::plank(),
        ExerciseKind::WallSit => PoseBuilder::standing().knee_angle(90.0),
    }
}
