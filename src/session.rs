// src/session.rs - verification session lifecycle
//
// A session runs once: Idle -> Running -> Stopped. Every analyzed frame goes
// through the classifier, the rep counter and the form analyzer independently;
// the session owns all of their state and the audit buffers.
use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{Classification, ExerciseClassifier};
use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::exercise::ExerciseKind;
use crate::form::{self, Breakdown, FormAnalyzer, FormSample};
use crate::keyframe::{encode_keyframe, KeyframeSource};
use crate::landmarks::PoseFrame;
use crate::rep_counter::{self, RepPhase, RepRules, RepState};
use crate::report::{confidence_score, AuditSnapshot, AuditTrail, FinalReport, Keyframe, LiveUpdate};

/// Analyzed frames logged in detail at the start of a session.
const VERBOSE_FRAMES: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub state: SessionState,
    pub reps: u32,
    pub hold_duration_seconds: u64,
    pub phase: RepPhase,
    pub is_holding: bool,
    pub form_accuracy: u8,
    pub session_average: u8,
    pub feedback: Vec<String>,
    pub elapsed_seconds: u64,
    pub frames_received: u64,
    pub frames_analyzed: u64,
}

enum PendingKeyframe {
    Encoding(JoinHandle<Result<Keyframe>>),
    Ready(Result<Keyframe>),
}

pub struct Session {
    id: Uuid,
    kind: ExerciseKind,
    config: VerifierConfig,
    state: SessionState,

    classifier: ExerciseClassifier,
    rep_rules: RepRules,
    reps: RepState,
    form: FormAnalyzer,

    // Frame clock: first analyzed timestamp and the furthest offset seen from it.
    first_frame_ms: Option<u64>,
    frame_elapsed_ms: u64,
    frames_received: u64,
    frames_analyzed: u64,
    latest: Option<FormSample>,

    snapshots: VecDeque<AuditSnapshot>,
    breakdown_totals: BTreeMap<String, u64>,
    breakdown_samples: u64,

    keyframe_source: Option<Box<dyn KeyframeSource>>,
    keyframes: Vec<PendingKeyframe>,

    report: Option<FinalReport>,
}

impl Session {
    pub fn new(kind: ExerciseKind) -> Self {
        Self::with_config(kind, VerifierConfig::default())
    }

    pub fn with_config(kind: ExerciseKind, config: VerifierConfig) -> Self {
        let config = config.sanitized();
        Self {
            id: Uuid::new_v4(),
            kind,
            classifier: ExerciseClassifier::with_config(kind, &config),
            rep_rules: RepRules::from_config(&config),
            reps: RepState::default(),
            form: FormAnalyzer::with_config(kind, &config),
            state: SessionState::Idle,
            first_frame_ms: None,
            frame_elapsed_ms: 0,
            frames_received: 0,
            frames_analyzed: 0,
            latest: None,
            snapshots: VecDeque::new(),
            breakdown_totals: BTreeMap::new(),
            breakdown_samples: 0,
            keyframe_source: None,
            keyframes: Vec::new(),
            report: None,
            config,
        }
    }

    /// Attaches the still-image source used for keyframes.
    pub fn with_keyframe_source(mut self, source: impl KeyframeSource + 'static) -> Self {
        self.keyframe_source = Some(Box::new(source));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Moves an idle session to running. Returns false (and does nothing)
    /// when the session is already running or has been stopped.
    pub fn start(&mut self) -> bool {
        match self.state {
            SessionState::Running => {
                warn!(session_id = %self.id, "start ignored, session already running");
                return false;
            }
            SessionState::Stopped => {
                warn!(session_id = %self.id, "start ignored, session already stopped");
                return false;
            }
            SessionState::Idle => {}
        }

        self.reps = RepState::default();
        self.form.reset();
        self.snapshots.clear();
        self.breakdown_totals.clear();
        self.breakdown_samples = 0;
        self.keyframes.clear();
        self.frames_received = 0;
        self.frames_analyzed = 0;
        self.latest = None;
        self.first_frame_ms = None;
        self.frame_elapsed_ms = 0;
        self.state = SessionState::Running;

        info!(
            session_id = %self.id,
            exercise = %self.kind,
            keyframes = self.keyframe_source.is_some(),
            "verification session started"
        );
        true
    }

    /// Feeds one frame. Returns a live update for analyzed frames only.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Option<LiveUpdate> {
        if self.state != SessionState::Running {
            return None;
        }

        self.frames_received += 1;
        if self.frames_received % self.config.analysis_stride != 0 {
            return None;
        }

        match self.analyze(frame) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    frame = self.frames_received,
                    error = %e,
                    "skipping frame"
                );
                None
            }
        }
    }

    fn analyze(&mut self, frame: &PoseFrame) -> Result<LiveUpdate> {
        frame.validate()?;
        self.frames_analyzed += 1;
        let first = *self.first_frame_ms.get_or_insert(frame.timestamp_ms);
        self.frame_elapsed_ms = self.frame_elapsed_ms.max(frame.timestamp_ms.saturating_sub(first));
        let analyzed = self.frames_analyzed;

        let detection = self.classifier.classify(frame);
        self.reps = rep_counter::transition(self.kind, self.reps, frame, &self.rep_rules);
        let sample = self.form.analyze(frame);

        if analyzed <= VERBOSE_FRAMES {
            debug!(
                session_id = %self.id,
                frame = analyzed,
                detected = ?detection.kind,
                confidence = detection.confidence,
                reps = self.reps.reps,
                accuracy = sample.form_accuracy,
                "analyzed frame"
            );
        }

        let elapsed_ms = self.elapsed_ms();
        if analyzed % self.config.audit_every == 0 {
            self.record_snapshot(frame, &sample, elapsed_ms);
        }
        if analyzed % self.config.keyframe_every == 0 {
            self.capture_keyframe(elapsed_ms);
        }

        let update = self.live_update(detection, &sample, elapsed_ms);
        self.latest = Some(sample);
        Ok(update)
    }

    fn live_update(&self, detection: Classification, sample: &FormSample, elapsed_ms: u64) -> LiveUpdate {
        let status = self.reps.status();
        LiveUpdate {
            exercise_kind: self.kind,
            detected_kind: detection.kind,
            classifier_confidence: detection.confidence,
            reps: status.reps,
            hold_duration_seconds: status.hold_duration_seconds,
            state: status.state,
            is_holding: status.is_holding,
            form_accuracy: sample.form_accuracy,
            feedback: sample.feedback.iter().take(2).cloned().collect(),
            form_breakdown: sample.breakdown.clone(),
            session_seconds: elapsed_ms / 1000,
        }
    }

    fn record_snapshot(&mut self, frame: &PoseFrame, sample: &FormSample, elapsed_ms: u64) {
        self.snapshots.push_back(AuditSnapshot {
            elapsed_ms,
            frame_timestamp_ms: frame.timestamp_ms,
            landmarks: frame.landmarks.clone(),
            form_accuracy: sample.form_accuracy,
            reps: self.reps.reps,
        });
        if self.snapshots.len() > self.config.max_audit_snapshots {
            self.snapshots.pop_front();
        }

        for (name, score) in &sample.breakdown {
            *self.breakdown_totals.entry(name.clone()).or_insert(0) += u64::from(*score);
        }
        self.breakdown_samples += 1;
    }

    fn capture_keyframe(&mut self, elapsed_ms: u64) {
        if self.keyframes.len() >= self.config.max_keyframes {
            return;
        }
        let Some(source) = self.keyframe_source.as_mut() else {
            return;
        };

        let image = match source.current_frame() {
            Ok(image) => image,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "keyframe capture failed");
                return;
            }
        };

        let (width, height, quality) = (
            self.config.keyframe_width,
            self.config.keyframe_height,
            self.config.keyframe_quality,
        );
        let pending = match tokio::runtime::Handle::try_current() {
            Ok(handle) => PendingKeyframe::Encoding(handle.spawn_blocking(move || {
                encode_keyframe(&image, elapsed_ms, width, height, quality)
            })),
            Err(_) => PendingKeyframe::Ready(encode_keyframe(&image, elapsed_ms, width, height, quality)),
        };
        self.keyframes.push(pending);
        debug!(session_id = %self.id, count = self.keyframes.len(), "keyframe captured");
    }

    /// Session time on the frame clock, so replays at any speed agree with hold timing.
    fn elapsed_ms(&self) -> u64 {
        self.frame_elapsed_ms
    }

    pub fn current_stats(&self) -> SessionStats {
        let status = self.reps.status();
        let (form_accuracy, feedback) = self
            .latest
            .as_ref()
            .map(|s| (s.form_accuracy, s.feedback.clone()))
            .unwrap_or_default();
        SessionStats {
            state: self.state,
            reps: status.reps,
            hold_duration_seconds: status.hold_duration_seconds,
            phase: status.state,
            is_holding: status.is_holding,
            form_accuracy,
            session_average: self.form.session_average(),
            feedback,
            elapsed_seconds: self.elapsed_ms() / 1000,
            frames_received: self.frames_received,
            frames_analyzed: self.frames_analyzed,
        }
    }

    /// Per-criterion mean of the sampled breakdowns, zeros when none were sampled.
    pub fn average_breakdown(&self) -> Breakdown {
        if self.breakdown_samples == 0 {
            return form::zero_breakdown(self.kind);
        }
        let count = self.breakdown_samples as f64;
        self.breakdown_totals
            .iter()
            .map(|(name, total)| (name.clone(), (*total as f64 / count).round() as u8))
            .collect()
    }

    /// Ends the session and builds the final report.
    ///
    /// Idle sessions return `None`. Stopping twice returns the first report again.
    pub async fn stop(&mut self) -> Option<FinalReport> {
        match self.state {
            SessionState::Idle => {
                debug!(session_id = %self.id, "stop ignored, session never started");
                return None;
            }
            SessionState::Stopped => return self.report.clone(),
            SessionState::Running => {}
        }
        self.state = SessionState::Stopped;

        let keyframes = self.collect_keyframes().await;
        let status = self.reps.status();
        let form_accuracy = self.form.session_average();

        let report = FinalReport {
            session_id: self.id,
            exercise_kind: self.kind,
            reps: status.reps,
            duration_seconds: self.elapsed_ms() / 1000,
            hold_duration_seconds: status.hold_duration_seconds,
            form_accuracy,
            form_breakdown: self.average_breakdown(),
            feedback: form::final_feedback(self.kind, form_accuracy),
            confidence_score: confidence_score(form_accuracy, status.reps),
            timestamp: Utc::now(),
            audit_trail: AuditTrail {
                snapshots: self.snapshots.iter().cloned().collect(),
                keyframes,
            },
        };

        info!(
            session_id = %self.id,
            reps = report.reps,
            form_accuracy = report.form_accuracy,
            confidence = report.confidence_score,
            snapshots = report.audit_trail.snapshots.len(),
            keyframes = report.audit_trail.keyframes.len(),
            "verification session complete"
        );

        self.report = Some(report.clone());
        Some(report)
    }

    async fn collect_keyframes(&mut self) -> Vec<Keyframe> {
        let mut keyframes = Vec::with_capacity(self.keyframes.len());
        for pending in std::mem::take(&mut self.keyframes) {
            let result = match pending {
                PendingKeyframe::Encoding(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(VerifyError::from(e)),
                },
                PendingKeyframe::Ready(result) => result,
            };
            match result {
                Ok(keyframe) => keyframes.push(keyframe),
                Err(e) => warn!(session_id = %self.id, error = %e, "dropping keyframe"),
            }
        }
        keyframes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::PoseLandmark as L;
    use crate::simulate::{session_frames, PoseBuilder};
    use image::DynamicImage;

    fn running(kind: ExerciseKind) -> Session {
        let mut session = Session::new(kind);
        assert!(session.start());
        session
    }

    fn blank() -> Result<DynamicImage> {
        Ok(DynamicImage::new_rgb8(64, 48))
    }

    #[test]
    fn only_every_second_frame_is_analyzed() {
        let mut session = running(ExerciseKind::Squat);
        let updates: Vec<bool> = (0..6)
            .map(|i| session.process_frame(&PoseBuilder::standing().build(i * 33)).is_some())
            .collect();
        assert_eq!(updates, vec![false, true, false, true, false, true]);
        let stats = session.current_stats();
        assert_eq!(stats.frames_received, 6);
        assert_eq!(stats.frames_analyzed, 3);
    }

    #[test]
    fn frames_before_start_are_ignored() {
        let mut session = Session::new(ExerciseKind::Squat);
        assert!(session.process_frame(&PoseBuilder::standing().build(0)).is_none());
        assert_eq!(session.current_stats().frames_received, 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let mut session = running(ExerciseKind::Squat);
        session.process_frame(&PoseBuilder::standing().build(0));
        assert!(!session.start());
        assert_eq!(session.current_stats().frames_received, 1);
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let mut session = running(ExerciseKind::Squat);
        let mut short = PoseBuilder::standing().build(0);
        short.landmarks.truncate(20);
        session.process_frame(&short);
        assert!(session.process_frame(&short).is_none());
        let mut nan = PoseBuilder::standing().build(100);
        nan.landmarks[L::LeftKnee.index()].x = f64::NAN;
        session.process_frame(&nan);
        assert!(session.process_frame(&nan).is_none());

        let stats = session.current_stats();
        assert_eq!(stats.frames_received, 4);
        assert_eq!(stats.frames_analyzed, 0);
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn live_update_carries_form_and_reps() {
        let mut session = running(ExerciseKind::Squat);
        for t in [0, 33, 400] {
            session.process_frame(&PoseBuilder::standing().knee_angle(70.0).build(t));
        }
        let update = session
            .process_frame(&PoseBuilder::standing().knee_angle(70.0).build(433))
            .unwrap();
        assert_eq!(update.exercise_kind, ExerciseKind::Squat);
        assert_eq!(update.form_accuracy, 100);
        assert_eq!(update.state, RepPhase::Down);
        assert_eq!(update.form_breakdown.len(), 3);
        assert!(update.feedback.len() <= 2);
    }

    #[test]
    fn session_time_follows_frame_timestamps() {
        let config = VerifierConfig {
            analysis_stride: 1,
            ..Default::default()
        };
        let mut session = Session::with_config(ExerciseKind::Squat, config);
        session.start();
        let first = session.process_frame(&PoseBuilder::standing().build(10_000)).unwrap();
        assert_eq!(first.session_seconds, 0);
        let later = session.process_frame(&PoseBuilder::standing().build(12_500)).unwrap();
        assert_eq!(later.session_seconds, 2);

        // Out-of-order frames never wind the clock back.
        session.process_frame(&PoseBuilder::standing().build(11_000));
        assert_eq!(session.current_stats().elapsed_seconds, 2);
    }

    #[test]
    fn snapshots_follow_analyzed_cadence() {
        let mut session = running(ExerciseKind::Squat);
        for frame in session_frames(ExerciseKind::Squat, 120, 30.0) {
            session.process_frame(&frame);
        }
        // 60 analyzed frames, one snapshot every 15th.
        assert_eq!(session.snapshots.len(), 4);
        assert_eq!(session.breakdown_samples, 4);
        assert_eq!(session.average_breakdown().len(), 3);
    }

    #[test]
    fn snapshot_buffer_is_bounded() {
        let config = VerifierConfig {
            analysis_stride: 1,
            audit_every: 1,
            max_audit_snapshots: 5,
            ..Default::default()
        };
        let mut session = Session::with_config(ExerciseKind::Squat, config);
        session.start();
        for i in 0..20 {
            session.process_frame(&PoseBuilder::standing().build(i * 33));
        }
        assert_eq!(session.snapshots.len(), 5);
        assert_eq!(session.snapshots.front().map(|s| s.frame_timestamp_ms), Some(15 * 33));
        assert_eq!(session.breakdown_samples, 20);
    }

    #[test]
    fn keyframes_are_capped_without_a_runtime() {
        let config = VerifierConfig {
            analysis_stride: 1,
            keyframe_every: 1,
            ..Default::default()
        };
        let mut session = Session::with_config(ExerciseKind::Squat, config).with_keyframe_source(blank);
        session.start();
        for i in 0..10 {
            session.process_frame(&PoseBuilder::standing().build(i * 33));
        }
        assert_eq!(session.keyframes.len(), 4);
    }

    #[tokio::test]
    async fn stop_before_start_returns_nothing() {
        let mut session = Session::new(ExerciseKind::Plank);
        assert!(session.stop().await.is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn immediate_stop_reports_zeros() {
        let mut session = running(ExerciseKind::Squat);
        let report = session.stop().await.unwrap();
        assert_eq!(report.reps, 0);
        assert_eq!(report.form_accuracy, 0);
        assert_eq!(report.confidence_score, 0.0);
        assert_eq!(report.form_breakdown, form::zero_breakdown(ExerciseKind::Squat));
        assert_eq!(report.feedback[0], "Review proper squat form");
        assert!(report.audit_trail.snapshots.is_empty());
        assert!(report.audit_trail.keyframes.is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut session = running(ExerciseKind::Squat);
        for frame in session_frames(ExerciseKind::Squat, 90, 30.0) {
            session.process_frame(&frame);
        }
        let first = session.stop().await.unwrap();
        assert!(session.process_frame(&PoseBuilder::standing().build(99_999)).is_none());
        let second = session.stop().await.unwrap();
        assert_eq!(first, second);
        assert!(!session.start());
    }

    #[tokio::test]
    async fn failed_captures_are_skipped() {
        let config = VerifierConfig {
            analysis_stride: 1,
            keyframe_every: 1,
            ..Default::default()
        };
        let mut calls = 0;
        let flaky = move || -> Result<DynamicImage> {
            calls += 1;
            if calls % 2 == 0 {
                Err(VerifyError::Capture("camera busy".to_string()))
            } else {
                blank()
            }
        };
        let mut session = Session::with_config(ExerciseKind::Squat, config).with_keyframe_source(flaky);
        session.start();
        for i in 0..12 {
            session.process_frame(&PoseBuilder::standing().build(i * 33));
        }
        let report = session.stop().await.unwrap();
        assert_eq!(report.audit_trail.keyframes.len(), 4);
        assert!(report.audit_trail.keyframes.iter().all(|k| k.data.starts_with("/9j/")));
    }
}
