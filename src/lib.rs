//! Real-time exercise form verification from pose landmark streams.
//!
//! Frames of 33 body landmarks flow into a [`Session`], which classifies the
//! pose, counts repetitions (or hold time) and scores form, then produces a
//! [`FinalReport`] with a sparse audit trail when stopped.

pub mod classifier;
pub mod config;
pub mod error;
pub mod exercise;
pub mod form;
pub mod geometry;
pub mod keyframe;
pub mod landmarks;
pub mod rep_counter;
pub mod report;
pub mod runner;
pub mod session;
pub mod simulate;

pub use classifier::{Classification, DetectedKind, ExerciseClassifier};
pub use config::{VerifierConfig, VisibilityThresholds};
pub use error::{FrameError, Result, VerifyError};
pub use exercise::ExerciseKind;
pub use form::{FormAnalyzer, FormSample};
pub use keyframe::{ImageSequenceSource, KeyframeSource};
pub use landmarks::{Landmark, PoseFrame, PoseLandmark};
pub use rep_counter::{RepCounter, RepPhase, RepState, RepStatus};
pub use report::{AuditSnapshot, AuditTrail, FinalReport, Keyframe, LiveUpdate};
pub use runner::SessionHandle;
pub use session::{Session, SessionState, SessionStats};
