// src/form.rs - weighted form scoring
//
// Every exercise is described by a `FormProfile`: the joints that must be
// clearly visible and a short list of criteria. A criterion measures one
// geometric quantity and maps it through a ladder of tiers to a 0-100 score.
use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::config::{VerifierConfig, VisibilityThresholds};
use crate::exercise::ExerciseKind;
use crate::geometry::{joint_angle, mean, mid_x, mid_y};
use crate::landmarks::{PoseFrame, PoseLandmark as L};

pub const REPOSITION_FEEDBACK: &str = "Position your full body in frame for accurate form detection";
const MAX_FRAME_FEEDBACK: usize = 2;
const MAX_FINAL_FEEDBACK: usize = 3;

/// Joints that must be visible before any exercise is scored.
pub const KEY_JOINTS: [L; 6] = [
    L::LeftShoulder,
    L::RightShoulder,
    L::LeftHip,
    L::RightHip,
    L::LeftKnee,
    L::RightKnee,
];

/// Named sub-scores, 0-100 each.
pub type Breakdown = BTreeMap<String, u8>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSample {
    pub form_accuracy: u8,
    pub breakdown: Breakdown,
    pub feedback: Vec<String>,
}

impl FormSample {
    fn zeroed(kind: ExerciseKind, feedback: Vec<String>) -> Self {
        Self {
            form_accuracy: 0,
            breakdown: zero_breakdown(kind),
            feedback,
        }
    }
}

/// Which side of a threshold a measurement must fall on. Bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Below(f64),
    Above(f64),
    Between(f64, f64),
    Outside(f64, f64),
    Always,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Band::Below(limit) => value < limit,
            Band::Above(limit) => value > limit,
            Band::Between(lo, hi) => value > lo && value < hi,
            Band::Outside(lo, hi) => value < lo || value > hi,
            Band::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub band: Band,
    pub score: u8,
    pub feedback: Option<&'static str>,
}

const fn tier(band: Band, score: u8, feedback: &'static str) -> Tier {
    Tier { band, score, feedback: Some(feedback) }
}

const fn top(band: Band) -> Tier {
    Tier { band, score: 100, feedback: None }
}

#[derive(Debug, Clone, Copy)]
pub struct Criterion {
    pub name: &'static str,
    pub weight: f64,
    pub measure: fn(&PoseFrame) -> Option<f64>,
    /// Checked in order; the first matching band wins.
    pub tiers: &'static [Tier],
}

impl Criterion {
    fn grade(&self, frame: &PoseFrame) -> (u8, Option<&'static str>) {
        let Some(value) = (self.measure)(frame) else {
            return (0, None);
        };
        self.tiers
            .iter()
            .find(|t| t.band.contains(value))
            .map(|t| (t.score, t.feedback))
            .unwrap_or((0, None))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FormProfile {
    /// Checked at the per-criterion visibility threshold.
    pub joints: &'static [L],
    pub criteria: &'static [Criterion],
}

// Measurements. Each returns None when a needed joint is missing.

fn knee_angles(f: &PoseFrame) -> Option<(f64, f64)> {
    let [lh, lk, la, rh, rk, ra] = f.joints([
        L::LeftHip,
        L::LeftKnee,
        L::LeftAnkle,
        L::RightHip,
        L::RightKnee,
        L::RightAnkle,
    ])?;
    Some((joint_angle(&lh, &lk, &la), joint_angle(&rh, &rk, &ra)))
}

fn elbow_angles(f: &PoseFrame) -> Option<(f64, f64)> {
    let [ls, le, lw, rs, re, rw] = f.joints([
        L::LeftShoulder,
        L::LeftElbow,
        L::LeftWrist,
        L::RightShoulder,
        L::RightElbow,
        L::RightWrist,
    ])?;
    Some((joint_angle(&ls, &le, &lw), joint_angle(&rs, &re, &rw)))
}

fn mean_knee_angle(f: &PoseFrame) -> Option<f64> {
    knee_angles(f).map(|(l, r)| mean(l, r))
}

fn min_knee_angle(f: &PoseFrame) -> Option<f64> {
    knee_angles(f).map(|(l, r)| l.min(r))
}

fn left_knee_angle(f: &PoseFrame) -> Option<f64> {
    let [h, k, a] = f.joints([L::LeftHip, L::LeftKnee, L::LeftAnkle])?;
    Some(joint_angle(&h, &k, &a))
}

fn knee_angle_from_right_angle(f: &PoseFrame) -> Option<f64> {
    mean_knee_angle(f).map(|a| (a - 90.0).abs())
}

fn mean_elbow_angle(f: &PoseFrame) -> Option<f64> {
    elbow_angles(f).map(|(l, r)| mean(l, r))
}

fn knee_over_ankle(f: &PoseFrame) -> Option<f64> {
    let [lk, la, rk, ra] = f.joints([L::LeftKnee, L::LeftAnkle, L::RightKnee, L::RightAnkle])?;
    Some(mean((lk.x - la.x).abs(), (rk.x - ra.x).abs()))
}

fn torso_lean(f: &PoseFrame) -> Option<f64> {
    let [ls, rs, lh, rh] = f.joints([L::LeftShoulder, L::RightShoulder, L::LeftHip, L::RightHip])?;
    Some((mid_x(&ls, &rs) - mid_x(&lh, &rh)).abs())
}

fn left_torso_lean(f: &PoseFrame) -> Option<f64> {
    let [s, h] = f.joints([L::LeftShoulder, L::LeftHip])?;
    Some((s.x - h.x).abs())
}

fn shoulder_hip_drop(f: &PoseFrame) -> Option<f64> {
    let [ls, rs, lh, rh] = f.joints([L::LeftShoulder, L::RightShoulder, L::LeftHip, L::RightHip])?;
    Some((mid_y(&ls, &rs) - mid_y(&lh, &rh)).abs())
}

fn hip_ankle_drop(f: &PoseFrame) -> Option<f64> {
    let [lh, rh, la] = f.joints([L::LeftHip, L::RightHip, L::LeftAnkle])?;
    Some((mid_y(&lh, &rh) - la.y).abs())
}

fn hip_tilt(f: &PoseFrame) -> Option<f64> {
    let [lh, rh] = f.joints([L::LeftHip, L::RightHip])?;
    Some((lh.y - rh.y).abs())
}

fn hip_knee_level(f: &PoseFrame) -> Option<f64> {
    let [h, k] = f.joints([L::LeftHip, L::LeftKnee])?;
    Some((h.y - k.y).abs())
}

fn arm_heights(f: &PoseFrame) -> Option<(f64, f64)> {
    let [ls, rs, lw, rw] = f.joints([L::LeftShoulder, L::RightShoulder, L::LeftWrist, L::RightWrist])?;
    Some((ls.y - lw.y, rs.y - rw.y))
}

fn arm_height_difference(f: &PoseFrame) -> Option<f64> {
    arm_heights(f).map(|(l, r)| (l - r).abs())
}

fn mean_arm_height(f: &PoseFrame) -> Option<f64> {
    arm_heights(f).map(|(l, r)| mean(l, r))
}

fn arm_abduction(f: &PoseFrame) -> Option<f64> {
    let [ls, rs, lw, rw] = f.joints([L::LeftShoulder, L::RightShoulder, L::LeftWrist, L::RightWrist])?;
    Some(mean((lw.x - ls.x).abs(), (rw.x - rs.x).abs()))
}

fn wrist_spread(f: &PoseFrame) -> Option<f64> {
    let [lw, rw] = f.joints([L::LeftWrist, L::RightWrist])?;
    Some((lw.x - rw.x).abs())
}

fn body_line_deviation(f: &PoseFrame) -> Option<f64> {
    let [ls, rs, lh, rh, la, ra] = f.joints([
        L::LeftShoulder,
        L::RightShoulder,
        L::LeftHip,
        L::RightHip,
        L::LeftAnkle,
        L::RightAnkle,
    ])?;
    let (s, h, a) = (mid_y(&ls, &rs), mid_y(&lh, &rh), mid_y(&la, &ra));
    Some((s - h).abs() + (h - a).abs())
}

/// Positive when the hips sit below the shoulders in the image.
fn hip_offset(f: &PoseFrame) -> Option<f64> {
    let [ls, rs, lh, rh] = f.joints([L::LeftShoulder, L::RightShoulder, L::LeftHip, L::RightHip])?;
    Some(mid_y(&lh, &rh) - mid_y(&ls, &rs))
}

fn shoulder_width(f: &PoseFrame) -> Option<f64> {
    let [ls, rs] = f.joints([L::LeftShoulder, L::RightShoulder])?;
    Some((ls.x - rs.x).abs())
}

// Per-exercise criterion tables

const LEG_JOINTS: &[L] = &[L::LeftKnee, L::RightKnee, L::LeftHip, L::RightHip];
const FULL_LEG_JOINTS: &[L] = &[
    L::LeftHip,
    L::RightHip,
    L::LeftKnee,
    L::RightKnee,
    L::LeftAnkle,
    L::RightAnkle,
];
const ARM_JOINTS: &[L] = &[
    L::LeftShoulder,
    L::RightShoulder,
    L::LeftElbow,
    L::RightElbow,
    L::LeftWrist,
    L::RightWrist,
];

static SQUAT: FormProfile = FormProfile {
    joints: LEG_JOINTS,
    criteria: &[
        Criterion {
            name: "depth",
            weight: 0.4,
            measure: mean_knee_angle,
            tiers: &[
                top(Band::Below(90.0)),
                tier(Band::Below(110.0), 85, "Increase squat depth slightly"),
                tier(Band::Below(130.0), 60, "Go lower - aim for thighs parallel to ground"),
                tier(Band::Always, 30, "Squat deeper - bend knees more"),
            ],
        },
        Criterion {
            name: "alignment",
            weight: 0.3,
            measure: knee_over_ankle,
            tiers: &[
                top(Band::Below(0.05)),
                tier(Band::Below(0.1), 75, "Keep knees aligned with toes"),
                tier(Band::Always, 40, "Knees caving inward - push them out"),
            ],
        },
        Criterion {
            name: "posture",
            weight: 0.3,
            measure: torso_lean,
            tiers: &[
                top(Band::Below(0.08)),
                tier(Band::Below(0.15), 75, "Keep chest up"),
                tier(Band::Always, 50, "Straighten your back - avoid leaning forward"),
            ],
        },
    ],
};

static PUSH_UP: FormProfile = FormProfile {
    joints: &[
        L::LeftShoulder,
        L::RightShoulder,
        L::LeftElbow,
        L::RightElbow,
        L::LeftHip,
        L::RightHip,
    ],
    criteria: &[
        Criterion {
            name: "depth",
            weight: 0.4,
            measure: mean_elbow_angle,
            tiers: &[
                top(Band::Below(90.0)),
                tier(Band::Below(120.0), 70, "Lower chest closer to ground"),
                tier(Band::Always, 40, "Bend elbows more - go deeper"),
            ],
        },
        Criterion {
            name: "backStraight",
            weight: 0.35,
            measure: shoulder_hip_drop,
            tiers: &[
                top(Band::Below(0.15)),
                tier(Band::Below(0.25), 65, "Keep body in straight line"),
                tier(Band::Always, 40, "Straighten your back - engage core"),
            ],
        },
        Criterion {
            name: "hipAlignment",
            weight: 0.25,
            measure: hip_ankle_drop,
            tiers: &[
                top(Band::Below(0.3)),
                tier(Band::Below(0.4), 70, "Don't let hips sag"),
                tier(Band::Always, 45, "Lower hips - keep body aligned"),
            ],
        },
    ],
};

static LUNGE: FormProfile = FormProfile {
    joints: FULL_LEG_JOINTS,
    criteria: &[
        Criterion {
            name: "kneeAlignment",
            weight: 0.4,
            measure: min_knee_angle,
            tiers: &[
                top(Band::Below(90.0)),
                tier(Band::Below(110.0), 75, "Drop front knee slightly lower"),
                tier(Band::Always, 50, "Lunge deeper - lower your body"),
            ],
        },
        Criterion {
            name: "torsoUpright",
            weight: 0.35,
            measure: torso_lean,
            tiers: &[
                top(Band::Below(0.08)),
                tier(Band::Below(0.15), 70, "Keep torso more upright"),
                tier(Band::Always, 45, "Stand up straighter - don't lean forward"),
            ],
        },
        Criterion {
            name: "balance",
            weight: 0.25,
            measure: hip_tilt,
            tiers: &[
                top(Band::Below(0.05)),
                tier(Band::Below(0.1), 70, "Keep hips level"),
                tier(Band::Always, 50, "Balance your weight evenly"),
            ],
        },
    ],
};

static SIT_TO_STAND: FormProfile = FormProfile {
    joints: &[
        L::LeftHip,
        L::LeftKnee,
        L::LeftAnkle,
        L::LeftShoulder,
        L::RightKnee,
    ],
    criteria: &[
        Criterion {
            name: "balance",
            weight: 0.4,
            measure: left_knee_angle,
            tiers: &[
                top(Band::Outside(100.0, 160.0)),
                tier(Band::Always, 70, "Rise with controlled movement"),
            ],
        },
        Criterion {
            name: "posture",
            weight: 0.35,
            measure: left_torso_lean,
            tiers: &[
                top(Band::Below(0.1)),
                tier(Band::Always, 65, "Keep back straight"),
            ],
        },
        Criterion {
            name: "extension",
            weight: 0.25,
            measure: mean_knee_angle,
            tiers: &[
                top(Band::Above(160.0)),
                tier(Band::Always, 70, "Stand fully upright"),
            ],
        },
    ],
};

static SHOULDER_RAISE: FormProfile = FormProfile {
    joints: ARM_JOINTS,
    criteria: &[
        Criterion {
            name: "symmetry",
            weight: 0.4,
            measure: arm_height_difference,
            tiers: &[
                top(Band::Below(0.05)),
                tier(Band::Below(0.1), 70, "Raise both arms evenly"),
                tier(Band::Always, 45, "Keep arms at same height"),
            ],
        },
        Criterion {
            name: "range",
            weight: 0.35,
            measure: mean_arm_height,
            tiers: &[
                top(Band::Above(0.25)),
                tier(Band::Above(0.15), 70, "Raise arms higher - to shoulder level"),
                tier(Band::Always, 50, "Lift arms higher"),
            ],
        },
        Criterion {
            name: "smoothness",
            weight: 0.25,
            measure: arm_abduction,
            tiers: &[
                top(Band::Above(0.2)),
                tier(Band::Always, 70, "Extend arms outward fully"),
            ],
        },
    ],
};

static FRONT_ARM_RAISE: FormProfile = FormProfile {
    joints: ARM_JOINTS,
    criteria: &[
        Criterion {
            name: "extension",
            weight: 0.4,
            measure: mean_elbow_angle,
            tiers: &[
                top(Band::Above(165.0)),
                tier(Band::Above(150.0), 75, "Straighten arms fully"),
                tier(Band::Always, 50, "Extend elbows completely"),
            ],
        },
        Criterion {
            name: "height",
            weight: 0.35,
            measure: mean_arm_height,
            tiers: &[
                top(Band::Above(0.25)),
                tier(Band::Above(0.15), 70, "Raise arms to shoulder level"),
                tier(Band::Always, 50, "Lift arms higher"),
            ],
        },
        Criterion {
            name: "control",
            weight: 0.25,
            measure: wrist_spread,
            tiers: &[
                top(Band::Below(0.1)),
                tier(Band::Always, 70, "Keep arms centered"),
            ],
        },
    ],
};

static PLANK: FormProfile = FormProfile {
    joints: &[
        L::LeftShoulder,
        L::RightShoulder,
        L::LeftHip,
        L::RightHip,
        L::LeftAnkle,
        L::RightAnkle,
    ],
    criteria: &[
        Criterion {
            name: "spine",
            weight: 0.4,
            measure: body_line_deviation,
            tiers: &[
                top(Band::Below(0.3)),
                tier(Band::Below(0.5), 65, "Straighten your body"),
                tier(Band::Always, 40, "Engage core - keep body straight"),
            ],
        },
        Criterion {
            name: "hipPosition",
            weight: 0.35,
            measure: hip_offset,
            tiers: &[
                top(Band::Between(-0.15, 0.15)),
                tier(Band::Above(0.15), 50, "Lower hips - don't pike up"),
                tier(Band::Always, 50, "Raise hips - don't sag"),
            ],
        },
        Criterion {
            name: "shoulders",
            weight: 0.25,
            measure: shoulder_width,
            tiers: &[
                top(Band::Between(0.15, 0.4)),
                tier(Band::Always, 75, "Adjust shoulder width"),
            ],
        },
    ],
};

static WALL_SIT: FormProfile = FormProfile {
    joints: FULL_LEG_JOINTS,
    criteria: &[
        Criterion {
            name: "kneeAngle",
            weight: 0.5,
            measure: knee_angle_from_right_angle,
            tiers: &[
                top(Band::Below(10.0)),
                tier(Band::Below(20.0), 75, "Adjust knee angle closer to 90°"),
                tier(Band::Always, 50, "Bend knees to 90 degrees"),
            ],
        },
        Criterion {
            name: "back",
            weight: 0.3,
            measure: left_torso_lean,
            tiers: &[
                top(Band::Below(0.08)),
                tier(Band::Below(0.15), 70, "Press back flat against wall"),
                tier(Band::Always, 45, "Keep back straight and against wall"),
            ],
        },
        Criterion {
            name: "hold",
            weight: 0.2,
            measure: hip_knee_level,
            tiers: &[
                top(Band::Below(0.1)),
                tier(Band::Always, 70, "Maintain position - don't drift up"),
            ],
        },
    ],
};

pub fn profile(kind: ExerciseKind) -> &'static FormProfile {
    match kind {
        ExerciseKind::Squat => &SQUAT,
        ExerciseKind::PushUp => &PUSH_UP,
        ExerciseKind::Lunge => &LUNGE,
        ExerciseKind::SitToStand => &SIT_TO_STAND,
        ExerciseKind::ShoulderRaise => &SHOULDER_RAISE,
        ExerciseKind::FrontArmRaise => &FRONT_ARM_RAISE,
        ExerciseKind::Plank => &PLANK,
        ExerciseKind::WallSit => &WALL_SIT,
    }
}

/// Breakdown with every criterion of `kind` at zero.
pub fn zero_breakdown(kind: ExerciseKind) -> Breakdown {
    profile(kind)
        .criteria
        .iter()
        .map(|c| (c.name.to_string(), 0))
        .collect()
}

/// Result of scoring one frame, before it touches the rolling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub sample: FormSample,
    /// Whether the sample counts toward the session average.
    pub recorded: bool,
}

/// Scores one frame without touching any session state.
pub fn evaluate(kind: ExerciseKind, frame: &PoseFrame, visibility: &VisibilityThresholds) -> Evaluation {
    if !frame.is_complete() {
        return Evaluation { sample: FormSample::zeroed(kind, Vec::new()), recorded: false };
    }

    if !frame.all_visible(&KEY_JOINTS, visibility.form_gate) {
        return Evaluation {
            sample: FormSample::zeroed(kind, vec![REPOSITION_FEEDBACK.to_string()]),
            recorded: false,
        };
    }

    let profile = profile(kind);
    if !frame.all_visible(profile.joints, visibility.form_criteria) {
        return Evaluation { sample: FormSample::zeroed(kind, Vec::new()), recorded: true };
    }

    let mut breakdown = Breakdown::new();
    let mut notes: Vec<(u8, &'static str)> = Vec::new();
    let mut weighted = 0.0;

    for criterion in profile.criteria {
        let (score, note) = criterion.grade(frame);
        weighted += f64::from(score) * criterion.weight;
        breakdown.insert(criterion.name.to_string(), score);
        if let Some(note) = note {
            notes.push((score, note));
        }
    }

    // Weakest criteria first; ties keep table order.
    notes.sort_by_key(|(score, _)| *score);
    let feedback = notes
        .into_iter()
        .take(MAX_FRAME_FEEDBACK)
        .map(|(_, note)| note.to_string())
        .collect();

    Evaluation {
        sample: FormSample {
            form_accuracy: weighted.round().clamp(0.0, 100.0) as u8,
            breakdown,
            feedback,
        },
        recorded: true,
    }
}

/// Scores frames for one exercise and keeps a bounded history for the average.
#[derive(Debug, Clone)]
pub struct FormAnalyzer {
    kind: ExerciseKind,
    visibility: VisibilityThresholds,
    window: VecDeque<u8>,
    capacity: usize,
}

impl FormAnalyzer {
    pub fn new(kind: ExerciseKind) -> Self {
        Self::with_config(kind, &VerifierConfig::default())
    }

    pub fn with_config(kind: ExerciseKind, config: &VerifierConfig) -> Self {
        let capacity = config.form_window.max(1);
        Self {
            kind,
            visibility: config.visibility,
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn analyze(&mut self, frame: &PoseFrame) -> FormSample {
        let Evaluation { sample, recorded } = evaluate(self.kind, frame, &self.visibility);
        if recorded {
            self.window.push_back(sample.form_accuracy);
            if self.window.len() > self.capacity {
                self.window.pop_front();
            }
        }
        sample
    }

    /// Rounded mean of the recorded window, 0 when empty.
    pub fn session_average(&self) -> u8 {
        if self.window.is_empty() {
            return 0;
        }
        let sum: u32 = self.window.iter().map(|s| u32::from(*s)).sum();
        (f64::from(sum) / self.window.len() as f64).round() as u8
    }

    pub fn recorded(&self) -> impl Iterator<Item = u8> + '_ {
        self.window.iter().copied()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Session summary advice, tiered by average accuracy.
pub fn final_feedback(kind: ExerciseKind, average: u8) -> Vec<String> {
    let tips = kind.coaching();
    let review = format!("Review proper {} form", kind.display_name());
    let lines: Vec<&str> = if average >= 85 {
        vec!["Excellent form throughout!", "Keep up this quality"]
    } else if average >= 70 {
        vec!["Good effort with minor form issues", tips.focus]
    } else if average >= 50 {
        vec!["Form needs improvement", tips.corrections[0], tips.corrections[1]]
    } else {
        vec![review.as_str(), "Watch demonstration video", "Practice with lighter intensity"]
    };
    lines
        .into_iter()
        .take(MAX_FINAL_FEEDBACK)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::PoseBuilder;
    use proptest::prelude::*;

    fn squat(angle: f64) -> PoseFrame {
        PoseBuilder::standing().knee_angle(angle).build(0)
    }

    #[test]
    fn weights_sum_to_one() {
        for kind in ExerciseKind::ALL {
            let total: f64 = profile(kind).criteria.iter().map(|c| c.weight).sum();
            assert!((total - 1.0).abs() < 1e-9, "{kind} weights sum to {total}");
        }
    }

    #[test]
    fn every_ladder_ends_in_a_catch_all() {
        for kind in ExerciseKind::ALL {
            for criterion in profile(kind).criteria {
                let last = criterion.tiers.last().map(|t| t.band);
                assert_eq!(last, Some(Band::Always), "{kind}/{}", criterion.name);
            }
        }
    }

    #[test]
    fn breakdown_keys_match_stored_reports() {
        let keys = |kind| zero_breakdown(kind).into_keys().collect::<Vec<_>>();
        assert_eq!(keys(ExerciseKind::Squat), ["alignment", "depth", "posture"]);
        assert_eq!(keys(ExerciseKind::ShoulderRaise), ["range", "smoothness", "symmetry"]);
        assert_eq!(keys(ExerciseKind::Plank), ["hipPosition", "shoulders", "spine"]);
    }

    #[test]
    fn deep_squat_scores_full_marks() {
        let sample = FormAnalyzer::new(ExerciseKind::Squat).analyze(&squat(70.0));
        assert_eq!(sample.form_accuracy, 100);
        assert_eq!(sample.breakdown["depth"], 100);
        assert_eq!(sample.breakdown["alignment"], 100);
        assert_eq!(sample.breakdown["posture"], 100);
        assert!(sample.feedback.is_empty());
    }

    #[test]
    fn depth_ladder_tiers() {
        let depth = |angle| {
            FormAnalyzer::new(ExerciseKind::Squat)
                .analyze(&squat(angle))
                .breakdown["depth"]
        };
        assert_eq!(depth(100.0), 85);
        assert_eq!(depth(120.0), 60);
        assert_eq!(depth(170.0), 30);
    }

    #[test]
    fn shallow_squat_is_weighted() {
        // depth 30 * 0.4 + alignment 100 * 0.3 + posture 100 * 0.3
        let sample = FormAnalyzer::new(ExerciseKind::Squat).analyze(&squat(170.0));
        assert_eq!(sample.form_accuracy, 72);
        assert_eq!(sample.feedback, vec!["Squat deeper - bend knees more".to_string()]);
    }

    #[test]
    fn occluded_key_joint_asks_to_reposition() {
        let frame = PoseBuilder::standing()
            .visibility_of(&[L::LeftKnee, L::RightKnee], 0.3)
            .build(0);
        let mut analyzer = FormAnalyzer::new(ExerciseKind::Squat);
        let sample = analyzer.analyze(&frame);
        assert_eq!(sample.form_accuracy, 0);
        assert_eq!(sample.feedback, vec![REPOSITION_FEEDBACK.to_string()]);
        assert!(sample.breakdown.values().all(|v| *v == 0));
        assert_eq!(analyzer.recorded().count(), 0);
    }

    #[test]
    fn blurry_criteria_joints_record_a_zero() {
        // Key joints pass 0.5, the squat's own joint set fails 0.6.
        let frame = PoseBuilder::standing().visibility(0.55).build(0);
        let mut analyzer = FormAnalyzer::new(ExerciseKind::Squat);
        let sample = analyzer.analyze(&frame);
        assert_eq!(sample.form_accuracy, 0);
        assert!(sample.feedback.is_empty());
        assert_eq!(analyzer.recorded().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn feedback_prefers_weakest_criteria() {
        let mut frame = squat(120.0);
        // Lean the torso forward and plant the left foot wide: all three criteria drop.
        frame.landmarks[L::LeftShoulder.index()].x += 0.2;
        frame.landmarks[L::RightShoulder.index()].x += 0.2;
        frame.landmarks[L::LeftAnkle.index()].x += 0.12;
        let sample = FormAnalyzer::new(ExerciseKind::Squat).analyze(&frame);
        assert_eq!(sample.breakdown["alignment"], 75);
        assert_eq!(
            sample.feedback,
            vec![
                "Squat deeper - bend knees more".to_string(),
                "Straighten your back - avoid leaning forward".to_string(),
            ]
        );
    }

    #[test]
    fn plank_hips_direction_feedback() {
        let mut frame = PoseBuilder::plank().build(0);
        for hip in [L::LeftHip, L::RightHip] {
            frame.landmarks[hip.index()].y += 0.2;
        }
        let sample = FormAnalyzer::new(ExerciseKind::Plank).analyze(&frame);
        assert_eq!(sample.breakdown["hipPosition"], 50);
        assert!(sample.feedback.contains(&"Lower hips - don't pike up".to_string()));
    }

    #[test]
    fn window_keeps_last_hundred() {
        let mut analyzer = FormAnalyzer::new(ExerciseKind::Squat);
        for _ in 0..100 {
            analyzer.analyze(&squat(170.0));
        }
        assert_eq!(analyzer.session_average(), 72);
        for _ in 0..100 {
            analyzer.analyze(&squat(70.0));
        }
        assert_eq!(analyzer.recorded().count(), 100);
        assert_eq!(analyzer.session_average(), 100);
        analyzer.reset();
        assert_eq!(analyzer.session_average(), 0);
    }

    #[test]
    fn final_feedback_tiers() {
        assert_eq!(final_feedback(ExerciseKind::Squat, 90)[0], "Excellent form throughout!");
        assert_eq!(
            final_feedback(ExerciseKind::Squat, 75),
            vec!["Good effort with minor form issues", "Focus on knee depth and alignment"]
        );
        assert_eq!(final_feedback(ExerciseKind::Squat, 55).len(), 3);
        assert_eq!(final_feedback(ExerciseKind::Squat, 10)[0], "Review proper squat form");
        for avg in [0u8, 49, 50, 69, 70, 84, 85, 100] {
            assert!(final_feedback(ExerciseKind::Plank, avg).len() <= 3);
        }
    }

    proptest! {
        #[test]
        fn scores_stay_in_range(
            kind_index in 0usize..8,
            coords in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0), 33),
        ) {
            let kind = ExerciseKind::ALL[kind_index];
            let landmarks = coords
                .iter()
                .enumerate()
                .map(|(i, (x, y, v))| crate::landmarks::Landmark::new(i, *x, *y, 0.0, *v))
                .collect();
            let frame = PoseFrame::new(0, landmarks);
            let sample = FormAnalyzer::new(kind).analyze(&frame);
            prop_assert!(sample.form_accuracy <= 100);
            prop_assert!(sample.breakdown.values().all(|v| *v <= 100));
            prop_assert!(sample.feedback.len() <= 2);
        }

        #[test]
        fn average_matches_window(angles in proptest::collection::vec(60.0f64..180.0, 1..250)) {
            let mut analyzer = FormAnalyzer::new(ExerciseKind::Squat);
            let mut history = Vec::new();
            for angle in angles {
                history.push(analyzer.analyze(&squat(angle)).form_accuracy);
            }
            let tail: Vec<u8> = history.iter().rev().take(100).rev().copied().collect();
            prop_assert_eq!(analyzer.recorded().collect::<Vec<_>>(), tail.clone());
            let mean = tail.iter().map(|v| f64::from(*v)).sum::<f64>() / tail.len() as f64;
            prop_assert_eq!(analyzer.session_average(), mean.round() as u8);
        }
    }
}
