// src/rep_counter.rs - repetition / hold state machine
//
// `transition` is pure: (state, frame) -> state. `RepCounter` only keeps the
// latest state for callers that prefer an object.
use serde::Serialize;

use crate::config::VerifierConfig;
use crate::exercise::ExerciseKind;
use crate::geometry::{joint_angle, mean};
use crate::landmarks::{PoseFrame, PoseLandmark as L};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RepPhase {
    #[default]
    Neutral,
    Down,
    Up,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepState {
    pub phase: RepPhase,
    pub reps: u32,
    pub hold_seconds: u64,
    pub hold_started_ms: Option<u64>,
    pub last_transition_ms: Option<u64>,
}

impl RepState {
    pub fn is_holding(&self) -> bool {
        self.hold_started_ms.is_some()
    }

    pub fn status(&self) -> RepStatus {
        RepStatus {
            reps: self.reps,
            hold_duration_seconds: self.hold_seconds,
            state: self.phase,
            is_holding: self.is_holding(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepStatus {
    pub reps: u32,
    pub hold_duration_seconds: u64,
    pub state: RepPhase,
    pub is_holding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepRules {
    pub min_state_interval_ms: u64,
    pub min_visibility: f64,
}

impl Default for RepRules {
    fn default() -> Self {
        Self::from_config(&VerifierConfig::default())
    }
}

impl RepRules {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            min_state_interval_ms: config.min_state_interval_ms,
            min_visibility: config.visibility.rep_counter,
        }
    }
}

/// Per-exercise movement rule. Angles in degrees, heights in normalized units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Mean of the left and right three-point angles.
    JointBend {
        left: [L; 3],
        right: [L; 3],
        flexed_below: f64,
        extended_above: f64,
    },
    /// One knee bent well past the other.
    Lunge {
        flexed_below: f64,
        min_asymmetry: f64,
        extended_above: f64,
    },
    /// Hip height relative to the knee together with knee angle.
    SitToStand {
        seated_below: f64,
        seated_margin: f64,
        standing_above: f64,
        standing_margin: f64,
    },
    /// Wrist height above the shoulders.
    ArmLift {
        lowered_below: f64,
        raised_above: f64,
        require_forward: bool,
    },
    /// Shoulder, hip and ankle close to level, shoulders off the floor.
    PlankHold {
        max_shoulder_hip: f64,
        max_hip_ankle: f64,
        max_shoulder_y: f64,
    },
    /// Knees near a target angle with hips level to the knees.
    WallSitHold {
        target_knee: f64,
        knee_tolerance: f64,
        max_hip_knee: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepProfile {
    /// Joints that must all be visible for a frame to count.
    pub required: &'static [L],
    pub motion: Motion,
}

const LEGS: &[L] = &[L::LeftKnee, L::RightKnee, L::LeftHip, L::RightHip];
const LEGS_FULL: &[L] = &[
    L::LeftHip,
    L::LeftKnee,
    L::LeftAnkle,
    L::RightHip,
    L::RightKnee,
    L::RightAnkle,
];
const ARMS: &[L] = &[L::LeftElbow, L::RightElbow, L::LeftShoulder, L::RightShoulder];
const REACH: &[L] = &[L::LeftShoulder, L::RightShoulder, L::LeftWrist, L::RightWrist];
const LEFT_LEG: &[L] = &[L::LeftHip, L::LeftKnee, L::LeftAnkle];
const LEFT_BODY: &[L] = &[L::LeftShoulder, L::LeftHip, L::LeftAnkle];

pub fn profile(kind: ExerciseKind) -> RepProfile {
    match kind {
        ExerciseKind::Squat => RepProfile {
            required: LEGS,
            motion: Motion::JointBend {
                left: [L::LeftHip, L::LeftKnee, L::LeftAnkle],
                right: [L::RightHip, L::RightKnee, L::RightAnkle],
                flexed_below: 100.0,
                extended_above: 160.0,
            },
        },
        ExerciseKind::PushUp => RepProfile {
            required: ARMS,
            motion: Motion::JointBend {
                left: [L::LeftShoulder, L::LeftElbow, L::LeftWrist],
                right: [L::RightShoulder, L::RightElbow, L::RightWrist],
                flexed_below: 90.0,
                extended_above: 160.0,
            },
        },
        ExerciseKind::Lunge => RepProfile {
            required: LEGS,
            motion: Motion::Lunge {
                flexed_below: 110.0,
                min_asymmetry: 20.0,
                extended_above: 160.0,
            },
        },
        ExerciseKind::SitToStand => RepProfile {
            required: LEFT_LEG,
            motion: Motion::SitToStand {
                seated_below: 110.0,
                seated_margin: 0.05,
                standing_above: 160.0,
                standing_margin: 0.1,
            },
        },
        ExerciseKind::ShoulderRaise => RepProfile {
            required: REACH,
            motion: Motion::ArmLift {
                lowered_below: 0.1,
                raised_above: 0.2,
                require_forward: false,
            },
        },
        ExerciseKind::FrontArmRaise => RepProfile {
            required: REACH,
            motion: Motion::ArmLift {
                lowered_below: 0.1,
                raised_above: 0.15,
                require_forward: true,
            },
        },
        ExerciseKind::Plank => RepProfile {
            required: LEFT_BODY,
            motion: Motion::PlankHold {
                max_shoulder_hip: 0.25,
                max_hip_ankle: 0.3,
                max_shoulder_y: 0.7,
            },
        },
        ExerciseKind::WallSit => RepProfile {
            required: LEGS_FULL,
            motion: Motion::WallSitHold {
                target_knee: 90.0,
                knee_tolerance: 25.0,
                max_hip_knee: 0.15,
            },
        },
    }
}

/// Where a single frame sits relative to a dynamic exercise's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Flexed,
    Extended,
    Between,
}

fn mean_angle(frame: &PoseFrame, left: [L; 3], right: [L; 3]) -> Option<f64> {
    let [a, b, c] = frame.joints(left)?;
    let [d, e, f] = frame.joints(right)?;
    Some(mean(joint_angle(&a, &b, &c), joint_angle(&d, &e, &f)))
}

fn knee_angles(frame: &PoseFrame) -> Option<(f64, f64)> {
    let [lh, lk, la, rh, rk, ra] = frame.joints([
        L::LeftHip,
        L::LeftKnee,
        L::LeftAnkle,
        L::RightHip,
        L::RightKnee,
        L::RightAnkle,
    ])?;
    Some((joint_angle(&lh, &lk, &la), joint_angle(&rh, &rk, &ra)))
}

fn position(motion: &Motion, frame: &PoseFrame) -> Option<Position> {
    let (flexed, extended) = match *motion {
        Motion::JointBend { left, right, flexed_below, extended_above } => {
            let angle = mean_angle(frame, left, right)?;
            (angle < flexed_below, angle > extended_above)
        }
        Motion::Lunge { flexed_below, min_asymmetry, extended_above } => {
            let (left, right) = knee_angles(frame)?;
            let lowest = left.min(right);
            let asymmetry = (left - right).abs();
            (lowest < flexed_below && asymmetry > min_asymmetry, lowest > extended_above)
        }
        Motion::SitToStand { seated_below, seated_margin, standing_above, standing_margin } => {
            let [hip, knee, ankle] = frame.joints([L::LeftHip, L::LeftKnee, L::LeftAnkle])?;
            let angle = joint_angle(&hip, &knee, &ankle);
            let seated = hip.y >= knee.y - seated_margin && angle < seated_below;
            let standing = hip.y < knee.y - standing_margin && angle > standing_above;
            (seated, standing)
        }
        Motion::ArmLift { lowered_below, raised_above, require_forward } => {
            let [ls, rs, lw, rw] =
                frame.joints([L::LeftShoulder, L::RightShoulder, L::LeftWrist, L::RightWrist])?;
            let height = mean(ls.y - lw.y, rs.y - rw.y);
            let forward = lw.z < ls.z || rw.z < rs.z;
            let raised = height > raised_above && (!require_forward || forward);
            (height < lowered_below, raised)
        }
        Motion::PlankHold { .. } | Motion::WallSitHold { .. } => return None,
    };

    Some(if flexed {
        Position::Flexed
    } else if extended {
        Position::Extended
    } else {
        Position::Between
    })
}

fn in_hold_position(motion: &Motion, frame: &PoseFrame) -> bool {
    match *motion {
        Motion::PlankHold { max_shoulder_hip, max_hip_ankle, max_shoulder_y } => {
            let Some([shoulder, hip, ankle]) =
                frame.joints([L::LeftShoulder, L::LeftHip, L::LeftAnkle])
            else {
                return false;
            };
            (shoulder.y - hip.y).abs() < max_shoulder_hip
                && (hip.y - ankle.y).abs() < max_hip_ankle
                && shoulder.y < max_shoulder_y
        }
        Motion::WallSitHold { target_knee, knee_tolerance, max_hip_knee } => {
            let Some((left, right)) = knee_angles(frame) else {
                return false;
            };
            let Some([hip, knee]) = frame.joints([L::LeftHip, L::LeftKnee]) else {
                return false;
            };
            (mean(left, right) - target_knee).abs() < knee_tolerance
                && (hip.y - knee.y).abs() < max_hip_knee
        }
        _ => false,
    }
}


/// Advances the state machine by one frame.
pub fn transition(kind: ExerciseKind, state: RepState, frame: &PoseFrame, rules: &RepRules) -> RepState {
    if !frame.is_complete() {
        return state;
    }

    let profile = profile(kind);
    let visible = frame.all_visible(profile.required, rules.min_visibility);

    if kind.is_hold() {
        return hold_transition(&profile.motion, state, frame, visible);
    }

    // Occluded joints never move a dynamic exercise.
    if !visible {
        return state;
    }
    let Some(position) = position(&profile.motion, frame) else {
        return state;
    };

    let now = frame.timestamp_ms;
    let mut next = state;
    // The debounce clock starts at the first usable frame after a reset.
    let last = *next.last_transition_ms.get_or_insert(now);
    let settled = now.saturating_sub(last) >= rules.min_state_interval_ms;
    match position {
        Position::Flexed if state.phase != RepPhase::Down && settled => {
            next.phase = RepPhase::Down;
            next.last_transition_ms = Some(now);
        }
        Position::Extended if state.phase == RepPhase::Down && settled => {
            next.phase = RepPhase::Up;
            next.reps += 1;
            next.last_transition_ms = Some(now);
        }
        _ => {}
    }
    next
}

fn hold_transition(motion: &Motion, state: RepState, frame: &PoseFrame, visible: bool) -> RepState {
    let now = frame.timestamp_ms;
    let mut next = state;

    // Holds tolerate no gaps: occlusion or a bad pose ends the hold.
    if !visible || !in_hold_position(motion, frame) {
        if state.is_holding() {
            next.phase = RepPhase::Neutral;
            next.hold_started_ms = None;
            next.last_transition_ms = Some(now);
        }
        return next;
    }

    let started = match state.hold_started_ms {
        Some(started) => started,
        None => {
            next.phase = RepPhase::Hold;
            next.hold_started_ms = Some(now);
            next.last_transition_ms = Some(now);
            now
        }
    };
    next.hold_seconds = now.saturating_sub(started) / 1000;
    next
}

/// Stateful wrapper around [`transition`] for one exercise.
#[derive(Debug, Clone)]
pub struct RepCounter {
    kind: ExerciseKind,
    rules: RepRules,
    state: RepState,
}

impl RepCounter {
    pub fn new(kind: ExerciseKind) -> Self {
        Self::with_rules(kind, RepRules::default())
    }

    pub fn with_rules(kind: ExerciseKind, rules: RepRules) -> Self {
        Self { kind, rules, state: RepState::default() }
    }

    pub fn process_frame(&mut self, frame: &PoseFrame) -> RepStatus {
        self.state = transition(self.kind, self.state, frame, &self.rules);
        self.state.status()
    }

    pub fn status(&self) -> RepStatus {
        self.state.status()
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RepState::default();
    }
}
