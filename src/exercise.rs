// src/exercise.rs - closed set of supported exercises
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Squat,
    PushUp,
    Lunge,
    SitToStand,
    ShoulderRaise,
    FrontArmRaise,
    Plank,
    WallSit,
}

/// How progress is measured for an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Reps,
    Hold,
}

/// Coaching copy used when a session is summarised.
#[derive(Debug, Clone, Copy)]
pub struct CoachingTips {
    /// Second line of the "good effort" tier.
    pub focus: &'static str,
    /// Two corrective cues for the "needs improvement" tier.
    pub corrections: [&'static str; 2],
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 8] = [
        ExerciseKind::Squat,
        ExerciseKind::PushUp,
        ExerciseKind::Lunge,
        ExerciseKind::SitToStand,
        ExerciseKind::ShoulderRaise,
        ExerciseKind::FrontArmRaise,
        ExerciseKind::Plank,
        ExerciseKind::WallSit,
    ];

    /// Identifier used in reports and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::PushUp => "pushup",
            ExerciseKind::Lunge => "lunge",
            ExerciseKind::SitToStand => "sittostand",
            ExerciseKind::ShoulderRaise => "shoulderraise",
            ExerciseKind::FrontArmRaise => "frontarmraise",
            ExerciseKind::Plank => "plank",
            ExerciseKind::WallSit => "wallsit",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::PushUp => "push-up",
            ExerciseKind::Lunge => "lunge",
            ExerciseKind::SitToStand => "sit-to-stand",
            ExerciseKind::ShoulderRaise => "shoulder raise",
            ExerciseKind::FrontArmRaise => "front arm raise",
            ExerciseKind::Plank => "plank",
            ExerciseKind::WallSit => "wall sit",
        }
    }

    pub fn measure(self) -> Measure {
        match self {
            ExerciseKind::Plank | ExerciseKind::WallSit => Measure::Hold,
            _ => Measure::Reps,
        }
    }

    pub fn is_hold(self) -> bool {
        self.measure() == Measure::Hold
    }

    pub fn coaching(self) -> CoachingTips {
        match self {
            ExerciseKind::Squat => CoachingTips {
                focus: "Focus on knee depth and alignment",
                corrections: ["Go deeper - bend knees more", "Keep knees aligned with toes"],
            },
            ExerciseKind::PushUp => CoachingTips {
                focus: "Focus on depth and a straight body line",
                corrections: ["Bend elbows more - go deeper", "Keep body in straight line"],
            },
            ExerciseKind::Lunge => CoachingTips {
                focus: "Focus on front knee depth and an upright torso",
                corrections: ["Lunge deeper - lower your body", "Keep torso more upright"],
            },
            ExerciseKind::SitToStand => CoachingTips {
                focus: "Focus on a controlled rise",
                corrections: ["Rise with controlled movement", "Stand fully upright"],
            },
            ExerciseKind::ShoulderRaise => CoachingTips {
                focus: "Focus on even arm height",
                corrections: ["Raise both arms evenly", "Raise arms higher - to shoulder level"],
            },
            ExerciseKind::FrontArmRaise => CoachingTips {
                focus: "Focus on straight arms at shoulder height",
                corrections: ["Straighten arms fully", "Raise arms to shoulder level"],
            },
            ExerciseKind::Plank => CoachingTips {
                focus: "Focus on a straight spine",
                corrections: ["Engage core - keep body straight", "Keep hips in line with shoulders"],
            },
            ExerciseKind::WallSit => CoachingTips {
                focus: "Focus on a 90 degree knee angle",
                corrections: ["Bend knees to 90 degrees", "Keep back straight and against wall"],
            },
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseKind {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        ExerciseKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| VerifyError::UnknownExercise(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loose_spellings() {
        assert_eq!("push-up".parse::<ExerciseKind>().unwrap(), ExerciseKind::PushUp);
        assert_eq!("Sit_To_Stand".parse::<ExerciseKind>().unwrap(), ExerciseKind::SitToStand);
        assert_eq!("wall sit".parse::<ExerciseKind>().unwrap(), ExerciseKind::WallSit);
        assert!("burpee".parse::<ExerciseKind>().is_err());
    }

    #[test]
    fn serde_matches_report_identifiers() {
        for kind in ExerciseKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn only_plank_and_wall_sit_are_holds() {
        let holds: Vec<_> = ExerciseKind::ALL.iter().filter(|k| k.is_hold()).collect();
        assert_eq!(holds, vec![&ExerciseKind::Plank, &ExerciseKind::WallSit]);
    }
}
