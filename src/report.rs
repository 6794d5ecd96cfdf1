// src/report.rs
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;

use crate::classifier::DetectedKind;
use crate::error::Result;
use crate::exercise::ExerciseKind;
use crate::form::Breakdown;
use crate::landmarks::{Landmark, PoseLandmark};
use crate::rep_counter::RepPhase;

/// Per-analyzed-frame update for a UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdate {
    pub exercise_kind: ExerciseKind,
    pub detected_kind: DetectedKind,
    pub classifier_confidence: f64,
    pub reps: u32,
    pub hold_duration_seconds: u64,
    pub state: RepPhase,
    pub is_holding: bool,
    pub form_accuracy: u8,
    pub feedback: Vec<String>,
    pub form_breakdown: Breakdown,
    pub session_seconds: u64,
}

/// Sparse landmark sample kept for after-the-fact review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSnapshot {
    /// Milliseconds since session start (wall clock).
    pub elapsed_ms: u64,
    pub frame_timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
    pub form_accuracy: u8,
    pub reps: u32,
}

/// A compressed still embedded as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub captured_at_ms: u64,
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditTrail {
    pub snapshots: Vec<AuditSnapshot>,
    pub keyframes: Vec<Keyframe>,
}

impl AuditTrail {
    /// Writes one row per snapshot to `path`, creating parent directories.
    ///
    /// Columns: elapsed_ms, frame_timestamp_ms, reps, form_accuracy, then
    /// `<joint>_x`, `<joint>_y`, `<joint>_visibility` for the twelve body joints.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let csv_path = path.as_ref().to_path_buf();

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(csv_header())?;
        for snapshot in &self.snapshots {
            writer.write_record(csv_row(snapshot))?;
        }

        writer.flush()?;
        Ok(csv_path)
    }
}

fn csv_header() -> Vec<String> {
    let mut header: Vec<String> = ["elapsed_ms", "frame_timestamp_ms", "reps", "form_accuracy"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for joint in PoseLandmark::BODY_JOINTS {
        let name = joint.name();
        header.push(format!("{name}_x"));
        header.push(format!("{name}_y"));
        header.push(format!("{name}_visibility"));
    }
    header
}

fn csv_row(snapshot: &AuditSnapshot) -> Vec<String> {
    let mut row = vec![
        snapshot.elapsed_ms.to_string(),
        snapshot.frame_timestamp_ms.to_string(),
        snapshot.reps.to_string(),
        snapshot.form_accuracy.to_string(),
    ];
    for joint in PoseLandmark::BODY_JOINTS {
        match snapshot.landmarks.get(joint.index()) {
            Some(lm) => {
                row.push(format!("{:.5}", lm.x));
                row.push(format!("{:.5}", lm.y));
                row.push(format!("{:.3}", lm.visibility));
            }
            None => row.extend(std::iter::repeat(String::new()).take(3)),
        }
    }
    row
}

/// Session summary handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub session_id: uuid::Uuid,
    pub exercise_kind: ExerciseKind,
    pub reps: u32,
    pub duration_seconds: u64,
    pub hold_duration_seconds: u64,
    pub form_accuracy: u8,
    pub form_breakdown: Breakdown,
    pub feedback: Vec<String>,
    pub confidence_score: f64,
    pub timestamp: DateTime<Utc>,
    pub audit_trail: AuditTrail,
}

impl FinalReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes `report.json` and `audit.csv` under `dir`.
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join("report.json");
        std::fs::write(&json_path, self.to_json_pretty()?)?;
        let csv_path = self.audit_trail.export_csv(dir.join("audit.csv"))?;

        Ok((json_path, csv_path))
    }
}

/// Blend of average form and rep volume, rounded to two decimals.
pub fn confidence_score(form_accuracy: u8, reps: u32) -> f64 {
    let form = f64::from(form_accuracy) / 100.0;
    let activity = (f64::from(reps) / 5.0).min(1.0);
    let confidence = form * 0.6 + activity * 0.4;
    (confidence * 100.0).round() / 100.0
}
