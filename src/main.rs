// src/main.rs
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use exercise_verifier::simulate::session_frames;
use exercise_verifier::{
    runner, ExerciseKind, ImageSequenceSource, PoseFrame, Session, SessionHandle, VerifierConfig,
};

#[derive(Parser)]
#[command(name = "exercise-verifier")]
#[command(about = "Verify exercise form from a pose landmark stream")]
#[command(version)]
struct Cli {
    /// Prescribed exercise (squat, pushup, lunge, sittostand, shoulderraise, frontarmraise, plank, wallsit)
    #[arg(short, long)]
    exercise: ExerciseKind,

    /// JSON-lines recording, one frame per line
    #[arg(short, long, conflicts_with = "simulate")]
    input: Option<PathBuf>,

    /// Generate this many synthetic frames instead of reading a recording
    #[arg(short, long)]
    simulate: Option<usize>,

    /// Frame rate of the synthetic stream
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Directory of still images served as keyframes
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Write report.json and audit.csv into this directory
    #[arg(long)]
    export: Option<PathBuf>,

    /// Config file (defaults to the per-user config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.input.is_none() && cli.simulate.is_none() {
        bail!("either --input or --simulate is required");
    }

    let config = match &cli.config {
        Some(path) => VerifierConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VerifierConfig::load_or_default(),
    };

    let mut session = Session::with_config(cli.exercise, config);
    if let Some(dir) = &cli.frames_dir {
        let source = ImageSequenceSource::open(dir)
            .with_context(|| format!("Failed to open keyframe directory {}", dir.display()))?;
        info!(dir = %source.dir().display(), images = source.len(), "keyframe source ready");
        session = session.with_keyframe_source(source);
    }

    let (handle, mut updates) = runner::spawn(session);
    info!(session_id = %handle.session_id(), exercise = %cli.exercise, "session running");

    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            debug!(
                reps = update.reps,
                hold = update.hold_duration_seconds,
                state = ?update.state,
                accuracy = update.form_accuracy,
                feedback = ?update.feedback,
                "live update"
            );
        }
    });

    if let Some(path) = &cli.input {
        replay(&handle, path).await?;
    } else if let Some(count) = cli.simulate {
        for frame in session_frames(cli.exercise, count, cli.fps) {
            handle.send(frame).await?;
        }
    }

    let report = handle
        .finish()
        .await?
        .context("Session ended without a report")?;
    let _ = printer.await;

    if let Some(dir) = &cli.export {
        let (json_path, csv_path) = report
            .export(dir)
            .with_context(|| format!("Failed to export to {}", dir.display()))?;
        info!(report = %json_path.display(), audit = %csv_path.display(), "exported");
    }

    println!("{}", report.to_json_pretty()?);
    Ok(())
}

/// Streams a JSON-lines recording into the session. Bad lines are skipped.
async fn replay(handle: &SessionHandle, path: &Path) -> Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open recording {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PoseFrame>(&line) {
            Ok(frame) => handle.send(frame).await?,
            Err(e) => warn!(line = line_no, error = %e, "skipping unreadable frame"),
        }
    }
    info!(frames = line_no, "recording replayed");
    Ok(())
}
