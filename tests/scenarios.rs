// End-to-end sessions driven through the runner and the orchestrator.
use exercise_verifier::form::REPOSITION_FEEDBACK;
use exercise_verifier::simulate::{session_frames, PoseBuilder};
use exercise_verifier::{
    runner, ExerciseKind, FormAnalyzer, PoseFrame, PoseLandmark, RepCounter, RepPhase, Session,
    VerifierConfig, VerifyError,
};
use image::DynamicImage;

fn every_frame() -> VerifierConfig {
    VerifierConfig {
        analysis_stride: 1,
        ..Default::default()
    }
}

#[test]
fn squat_trace_counts_one_rep() {
    let mut counter = RepCounter::new(ExerciseKind::Squat);
    let trace = [170.0, 170.0, 95.0, 95.0, 170.0];
    for (i, angle) in trace.iter().enumerate() {
        counter.process_frame(&PoseBuilder::standing().knee_angle(*angle).build(i as u64 * 400));
    }
    assert_eq!(counter.status().reps, 1);
}

#[tokio::test]
async fn squat_trace_through_a_session() {
    let mut session = Session::with_config(ExerciseKind::Squat, every_frame());
    session.start();
    for (i, angle) in [170.0, 170.0, 95.0, 95.0, 170.0].iter().enumerate() {
        session.process_frame(&PoseBuilder::standing().knee_angle(*angle).build(i as u64 * 400));
    }
    let report = session.stop().await.unwrap();
    assert_eq!(report.reps, 1);
}

#[tokio::test]
async fn simulated_squats_are_counted() {
    let (handle, _updates) = runner::spawn(Session::new(ExerciseKind::Squat));
    for frame in session_frames(ExerciseKind::Squat, 130, 30.0) {
        handle.send(frame).await.unwrap();
    }
    let report = handle.finish().await.unwrap().unwrap();
    assert_eq!(report.reps, 2);
    assert!(report.form_accuracy > 0);
    assert!((0.0..=1.0).contains(&report.confidence_score));
}

#[tokio::test]
async fn occluded_knees_never_score() {
    let (handle, mut updates) = runner::spawn(Session::new(ExerciseKind::Squat));
    let knees = [PoseLandmark::LeftKnee, PoseLandmark::RightKnee];
    for (i, angle) in [170.0, 90.0, 170.0, 90.0, 170.0, 90.0, 170.0, 90.0].iter().enumerate() {
        let frame = PoseBuilder::standing()
            .knee_angle(*angle)
            .visibility_of(&knees, 0.3)
            .build(i as u64 * 500);
        handle.send(frame).await.unwrap();
    }
    let report = handle.finish().await.unwrap().unwrap();

    assert_eq!(report.reps, 0);
    assert_eq!(report.form_accuracy, 0);
    let mut seen = 0;
    while let Some(update) = updates.recv().await {
        assert_eq!(update.form_accuracy, 0);
        assert_eq!(update.feedback, vec![REPOSITION_FEEDBACK.to_string()]);
        seen += 1;
    }
    assert_eq!(seen, 4);
}

#[test]
fn recorded_frame_without_visibility_is_treated_as_occluded() {
    let mut json = serde_json::to_value(PoseBuilder::standing().knee_angle(70.0).build(0)).unwrap();
    for landmark in json["landmarks"].as_array_mut().unwrap() {
        landmark.as_object_mut().unwrap().remove("visibility");
    }
    let frame: PoseFrame = serde_json::from_value(json).unwrap();

    let sample = FormAnalyzer::new(ExerciseKind::Squat).analyze(&frame);
    assert_eq!(sample.form_accuracy, 0);
    assert_eq!(sample.feedback, vec![REPOSITION_FEEDBACK.to_string()]);

    let mut counter = RepCounter::new(ExerciseKind::Squat);
    counter.process_frame(&frame);
    counter.process_frame(&PoseFrame::new(1000, frame.landmarks.clone()));
    assert_eq!(counter.status().state, RepPhase::Neutral);
}

#[tokio::test]
async fn constant_deep_squat_is_form_only_confidence() {
    let (handle, _updates) = runner::spawn(Session::new(ExerciseKind::Squat));
    for i in 0..200u64 {
        handle
            .send(PoseBuilder::standing().knee_angle(70.0).build(i * 33))
            .await
            .unwrap();
    }
    let report = handle.finish().await.unwrap().unwrap();

    assert_eq!(report.reps, 0);
    assert_eq!(report.form_breakdown["depth"], 100);
    let expected = (0.6 * f64::from(report.form_accuracy)).round() / 100.0;
    assert_eq!(report.confidence_score, expected);
    assert_eq!(report.confidence_score, 0.6);
}

#[tokio::test]
async fn immediate_stop_is_all_zeros() {
    let (handle, _updates) = runner::spawn(Session::new(ExerciseKind::Squat));
    let report = handle.stop().await.unwrap().unwrap();

    assert_eq!(report.reps, 0);
    assert_eq!(report.confidence_score, 0.0);
    assert_eq!(report.form_breakdown.len(), 3);
    assert!(report.form_breakdown.values().all(|v| *v == 0));
}

#[tokio::test]
async fn keyframes_never_exceed_four() {
    let source = || -> exercise_verifier::Result<DynamicImage> { Ok(DynamicImage::new_rgb8(320, 240)) };
    let session = Session::new(ExerciseKind::Squat).with_keyframe_source(source);
    let (handle, _updates) = runner::spawn(session);
    for frame in session_frames(ExerciseKind::Squat, 1500, 30.0) {
        handle.send(frame).await.unwrap();
    }
    let report = handle.finish().await.unwrap().unwrap();

    assert_eq!(report.audit_trail.keyframes.len(), 4);
    // 750 analyzed frames, one snapshot every 15th.
    assert_eq!(report.audit_trail.snapshots.len(), 50);
}

#[tokio::test]
async fn broken_keyframe_source_does_not_fail_the_report() {
    let source = || -> exercise_verifier::Result<DynamicImage> {
        Err(VerifyError::Capture("no video".to_string()))
    };
    let session = Session::new(ExerciseKind::Squat).with_keyframe_source(source);
    let (handle, _updates) = runner::spawn(session);
    for frame in session_frames(ExerciseKind::Squat, 400, 30.0) {
        handle.send(frame).await.unwrap();
    }
    let report = handle.finish().await.unwrap().unwrap();
    assert!(report.audit_trail.keyframes.is_empty());
}

#[tokio::test]
async fn second_stop_returns_the_same_report() {
    let mut session = Session::new(ExerciseKind::Lunge);
    assert_eq!(session.kind(), ExerciseKind::Lunge);
    session.start();
    for frame in session_frames(ExerciseKind::Lunge, 200, 30.0) {
        session.process_frame(&frame);
    }
    let first = session.stop().await.unwrap();
    let second = session.stop().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn plank_reports_hold_time() {
    let mut session = Session::new(ExerciseKind::Plank);
    session.start();
    for frame in session_frames(ExerciseKind::Plank, 180, 30.0) {
        session.process_frame(&frame);
    }
    let stats = session.current_stats();
    assert!(stats.is_holding);
    let report = session.stop().await.unwrap();
    assert_eq!(report.reps, 0);
    assert_eq!(report.hold_duration_seconds, 5);
}

#[tokio::test]
async fn replayed_plank_hold_fits_inside_the_session() {
    // A minute of frames pushed through as fast as possible.
    let frames = session_frames(ExerciseKind::Plank, 1800, 30.0);
    let mut session = Session::new(ExerciseKind::Plank);
    session.start();
    for frame in &frames {
        session.process_frame(frame);
    }
    let report = session.stop().await.unwrap();

    assert_eq!(report.hold_duration_seconds, 59);
    assert_eq!(report.duration_seconds, 59);
    assert!(report.hold_duration_seconds <= report.duration_seconds);

    let first = frames[1].timestamp_ms;
    let last = report.audit_trail.snapshots.last().unwrap();
    assert_eq!(last.elapsed_ms, last.frame_timestamp_ms - first);
    assert_eq!(last.elapsed_ms, frames[1799].timestamp_ms - first);
}

#[tokio::test]
async fn report_exports_json_and_csv() {
    let mut session = Session::new(ExerciseKind::Squat);
    session.start();
    for frame in session_frames(ExerciseKind::Squat, 120, 30.0) {
        session.process_frame(&frame);
    }
    let report = session.stop().await.unwrap();

    let dir = std::env::temp_dir().join(format!("export_{}", report.session_id));
    let (json_path, csv_path) = report.export(&dir).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["exerciseKind"], "squat");
    assert_eq!(json["reps"], report.reps);

    let rows = csv::Reader::from_path(&csv_path).unwrap().records().count();
    assert_eq!(rows, report.audit_trail.snapshots.len());

    let _ = std::fs::remove_dir_all(&dir);
}
