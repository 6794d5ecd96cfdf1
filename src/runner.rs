// src/runner.rs - channel-fed session loop
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, VerifyError};
use crate::landmarks::PoseFrame;
use crate::report::{FinalReport, LiveUpdate};
use crate::session::Session;

/// How the session loop should wind down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Process whatever is already queued, then stop.
    Drain,
    /// Stop after the current frame; queued frames are discarded.
    Discard,
}

/// Producer side of a running session.
pub struct SessionHandle {
    session_id: Uuid,
    frames: mpsc::Sender<PoseFrame>,
    shutdown: oneshot::Sender<Shutdown>,
    task: JoinHandle<Option<FinalReport>>,
}

/// Starts `session` on the current runtime.
///
/// Frames sent through the handle are processed in order. Live updates are
/// delivered best-effort: when the update channel is full they are dropped.
pub fn spawn(mut session: Session) -> (SessionHandle, mpsc::Receiver<LiveUpdate>) {
    let config = session.config().clone();
    let (frame_tx, mut frame_rx) = mpsc::channel::<PoseFrame>(config.frame_channel_capacity);
    let (update_tx, update_rx) = mpsc::channel::<LiveUpdate>(config.update_channel_capacity);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<Shutdown>();
    let session_id = session.id();

    let task = tokio::spawn(async move {
        session.start();
        loop {
            tokio::select! {
                biased;

                shutdown = &mut shutdown_rx => {
                    // A dropped handle counts as a discard.
                    if let Ok(Shutdown::Drain) = shutdown {
                        let mut drained = 0usize;
                        while let Ok(frame) = frame_rx.try_recv() {
                            forward(&mut session, &update_tx, &frame);
                            drained += 1;
                        }
                        debug!(session_id = %session_id, drained, "frame queue drained");
                    }
                    debug!(session_id = %session_id, "stop requested");
                    break;
                }

                frame = frame_rx.recv() => {
                    let Some(frame) = frame else {
                        debug!(session_id = %session_id, "frame source closed");
                        break;
                    };
                    forward(&mut session, &update_tx, &frame);
                }
            }
        }
        frame_rx.close();
        session.stop().await
    });

    let handle = SessionHandle {
        session_id,
        frames: frame_tx,
        shutdown: shutdown_tx,
        task,
    };
    (handle, update_rx)
}

fn forward(session: &mut Session, updates: &mpsc::Sender<LiveUpdate>, frame: &PoseFrame) {
    if let Some(update) = session.process_frame(frame) {
        if let Err(mpsc::error::TrySendError::Full(_)) = updates.try_send(update) {
            debug!(session_id = %session.id(), "live update dropped, subscriber is behind");
        }
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// A sender for producers that outlive the handle borrow.
    ///
    /// Clones do not keep the session alive: frames they send after
    /// [`finish`](Self::finish) or [`stop`](Self::stop) are rejected.
    pub fn frame_sender(&self) -> mpsc::Sender<PoseFrame> {
        self.frames.clone()
    }

    /// Queues a frame, waiting while the channel is full.
    pub async fn send(&self, frame: PoseFrame) -> Result<()> {
        self.frames.send(frame).await.map_err(|_| VerifyError::ChannelClosed)
    }

    /// Processes every frame already queued, then stops.
    pub async fn finish(self) -> Result<Option<FinalReport>> {
        self.shutdown_with(Shutdown::Drain).await
    }

    /// Stops as soon as the current frame is done. Queued frames are discarded.
    pub async fn stop(self) -> Result<Option<FinalReport>> {
        self.shutdown_with(Shutdown::Discard).await
    }

    async fn shutdown_with(self, mode: Shutdown) -> Result<Option<FinalReport>> {
        let SessionHandle { session_id, frames, shutdown, task } = self;
        if shutdown.send(mode).is_err() {
            warn!(session_id = %session_id, "session loop already finished");
        }
        drop(frames);
        Ok(task.await?)
    }
}
