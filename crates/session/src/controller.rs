//! Async driver for the per-scene recording workflow.
//!
//! [`RecordingController`] owns the [`RecordingSession`] of the scene on
//! screen and performs the side effects its transitions ask for: starting
//! and stopping the capture device, running the recording clock, and
//! handing finished takes to the uploader in the background.
//!
//! Session state sits behind a single mutex that is never held across a
//! device or network call. Results that come back after the user moved on
//! are matched against the take id before they touch any state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shotguide_client::{SceneUploadMeta, SceneUploader, UploadError};
use shotguide_core::error::CoreError;
use shotguide_core::overlay::{project, RenderSet};
use shotguide_core::recording::{
    RecordingSession, SessionPhase, Tick, Transition, UploadOutcome, UploadTicket,
};
use shotguide_core::submission::AiFeedback;
use shotguide_core::types::SceneNumber;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureDevice;
use crate::config::RecorderConfig;
use crate::context::SessionContext;
use crate::error::SessionError;
use crate::events::{publish, SessionEvent, SessionEventKind, EVENT_CHANNEL_CAPACITY};

/// Drives one recording screen.
///
/// Dropping the controller stops its recording clock; uploads already in
/// flight still complete and are applied through the shared context.
pub struct RecordingController {
    shared: Arc<Shared>,
}

struct Shared {
    session: Mutex<RecordingSession>,
    device: Arc<dyn CaptureDevice>,
    uploader: Arc<dyn SceneUploader>,
    context: Arc<SessionContext>,
    config: RecorderConfig,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Token of the running clock, if any.
    ticker: Mutex<Option<CancellationToken>>,
    /// Parent of every clock token, cancelled on drop.
    cancel: CancellationToken,
    /// Take id of the last `stop_capture` issued for a stopped take.
    device_stopped_for: AtomicU64,
}

/// A stopped take waiting for its media file.
#[derive(Clone, Copy)]
struct StoppedTake {
    take_id: u64,
    scene_index: usize,
    elapsed_secs: u32,
}

impl RecordingController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        uploader: Arc<dyn SceneUploader>,
        context: Arc<SessionContext>,
        config: RecorderConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(RecordingSession::unbound()),
                device,
                uploader,
                context,
                config,
                event_tx,
                ticker: Mutex::new(None),
                cancel: CancellationToken::new(),
                device_stopped_for: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.shared.context
    }

    /// Copy of the current session state.
    pub async fn session(&self) -> RecordingSession {
        self.shared.session.lock().await.clone()
    }

    /// Overlay primitives for the bound scene in a container of the given
    /// size. `Hidden` when no scene is bound.
    pub async fn render_set(&self, container_width: f64, container_height: f64) -> RenderSet {
        let Some(index) = self.shared.session.lock().await.scene_index() else {
            return RenderSet::Hidden;
        };
        let Some(template) = self.shared.context.template().await else {
            return RenderSet::Hidden;
        };
        template
            .scene(index)
            .map(|scene| project(scene, container_width, container_height))
            .unwrap_or(RenderSet::Hidden)
    }

    /// Enter the recording screen for scene `index` of the selected
    /// template. A take still recording on the previous scene is stopped.
    pub async fn bind_scene(&self, index: usize) -> Result<(), SessionError> {
        let template = self.shared.context.require_template().await?;
        let scene = template.scene(index).ok_or_else(|| {
            CoreError::Validation(format!(
                "scene index {index} out of range (template has {})",
                template.scenes.len()
            ))
        })?;

        self.leave().await;

        let session = RecordingSession::for_scene(scene, self.shared.config.default_scene_duration_secs);
        tracing::info!(
            template_id = %template.id,
            scene_index = index,
            limit_secs = session.remaining_secs().unwrap_or_default(),
            "Scene bound",
        );
        *self.shared.session.lock().await = session;
        Ok(())
    }

    /// Start a new take and the recording clock.
    pub async fn start(&self) -> Result<Transition, SessionError> {
        let (take_id, scene) = {
            let mut session = self.shared.session.lock().await;
            if session.start()? == Transition::Ignored {
                tracing::debug!(phase = ?session.phase(), "Start ignored");
                return Ok(Transition::Ignored);
            }
            let scene = session.scene().ok_or(CoreError::NoTemplateSelected)?;
            (session.take_id(), scene)
        };

        if let Err(e) = self.shared.device.start_capture().await {
            tracing::warn!(take_id, error = %e, "Capture failed to start");
            let mut session = self.shared.session.lock().await;
            if session.take_id() == take_id {
                session.abort_start();
            }
            return Err(e.into());
        }

        let still_current = {
            let session = self.shared.session.lock().await;
            session.take_id() == take_id && session.is_recording()
        };
        if !still_current {
            // Stopped or left while the camera was starting. The device
            // was already stopped if that path collected this take.
            if self.shared.device_stopped_for.load(Ordering::SeqCst) == take_id {
                tracing::debug!(take_id, "Take stopped during capture start");
                return Ok(Transition::Ignored);
            }
            tracing::debug!(take_id, "Take replaced during capture start, stopping device");
            if let Err(e) = self.shared.device.stop_capture().await {
                tracing::warn!(take_id, error = %e, "Failed to stop orphaned capture");
            }
            return Ok(Transition::Ignored);
        }

        tracing::info!(
            take_id,
            scene_index = scene.index,
            limit_secs = scene.duration_limit_secs,
            "Recording started",
        );
        publish(
            &self.shared.event_tx,
            SessionEventKind::RecordingStarted {
                scene_index: scene.index,
                take_id,
                limit_secs: scene.duration_limit_secs,
            },
        );
        self.shared.spawn_ticker(take_id).await;
        Ok(Transition::Applied)
    }

    /// Stop the current take and collect its media file.
    pub async fn stop(&self) -> Result<Transition, SessionError> {
        let Some(take) = self.shared.stop_session().await else {
            return Ok(Transition::Ignored);
        };
        self.shared.cancel_ticker().await;
        self.shared.collect_media(take, false).await?;
        Ok(Transition::Applied)
    }

    /// Hand the stopped take to the uploader.
    ///
    /// Returns as soon as the session is `Uploading`; the upload runs on
    /// its own task and is not cancelled by [`leave`](Self::leave). The
    /// handle resolves to how its result was applied.
    pub async fn submit(&self) -> Result<JoinHandle<UploadOutcome>, SessionError> {
        let template = self.shared.context.require_template().await?;

        let (ticket, meta) = {
            let mut session = self.shared.session.lock().await;
            let index = session.scene_index().ok_or(CoreError::NoTemplateSelected)?;
            let scene = template.scene(index).ok_or_else(|| {
                CoreError::Validation(format!("scene index {index} not in template"))
            })?;
            let ticket = session.begin_upload()?;
            let meta = SceneUploadMeta {
                template_id: template.id.clone(),
                user_id: self.shared.context.user_id().to_string(),
                scene_number: scene.scene_number(),
                scene_title: scene.title.clone(),
            };
            (ticket, meta)
        };

        tracing::info!(
            take_id = ticket.take_id,
            scene_number = meta.scene_number,
            "Submitting take",
        );
        publish(
            &self.shared.event_tx,
            SessionEventKind::UploadStarted {
                scene_number: meta.scene_number,
                take_id: ticket.take_id,
            },
        );

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move {
            let result = shared.uploader.upload_scene(&ticket.media, &meta).await;
            shared.apply_upload(&ticket, &meta, result).await
        }))
    }

    /// Drop the current take to re-record it.
    ///
    /// Discarding a submitted take also clears the scene's review outcome
    /// in the shared context until the next refresh.
    pub async fn discard(&self) -> Transition {
        let (was_submitted, scene_index) = {
            let mut session = self.shared.session.lock().await;
            let was_submitted = session.phase() == SessionPhase::Submitted;
            if session.discard() == Transition::Ignored {
                tracing::debug!(phase = ?session.phase(), "Discard ignored");
                return Transition::Ignored;
            }
            (was_submitted, session.scene_index())
        };

        let Some(scene_index) = scene_index else {
            return Transition::Applied;
        };

        if was_submitted {
            if let Some(template) = self.shared.context.template().await {
                let scene_number = scene_index as SceneNumber + 1;
                self.shared
                    .context
                    .clear_for_rerecord(&template.id, scene_number)
                    .await;
            }
        }

        tracing::info!(scene_index, "Take discarded");
        publish(
            &self.shared.event_tx,
            SessionEventKind::TakeDiscarded { scene_index },
        );
        Transition::Applied
    }

    /// Leave the recording screen: stop the clock, stop any running
    /// capture, and drop the session. Uploads in flight keep going.
    pub async fn leave(&self) {
        self.shared.cancel_ticker().await;

        if let Some(take) = self.shared.stop_session().await {
            tracing::info!(take_id = take.take_id, "Stopping capture on exit");
            if let Err(e) = self.shared.collect_media(take, false).await {
                tracing::warn!(take_id = take.take_id, error = %e, "Stop on exit failed");
            }
        }

        *self.shared.session.lock().await = RecordingSession::unbound();
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Shared internals
// ---------------------------------------------------------------------------

impl Shared {
    /// `Recording -> Stopped`, returning the take that stopped.
    async fn stop_session(&self) -> Option<StoppedTake> {
        let mut session = self.session.lock().await;
        if session.stop() == Transition::Ignored {
            return None;
        }
        Some(StoppedTake {
            take_id: session.take_id(),
            scene_index: session.scene_index().unwrap_or_default(),
            elapsed_secs: session.elapsed_secs(),
        })
    }

    async fn cancel_ticker(&self) {
        if let Some(token) = self.ticker.lock().await.take() {
            token.cancel();
        }
    }

    async fn spawn_ticker(self: &Arc<Self>, take_id: u64) {
        let token = self.cancel.child_token();
        if let Some(previous) = self.ticker.lock().await.replace(token.clone()) {
            previous.cancel();
        }

        let shared = Arc::clone(self);
        let period = self.config.tick_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !shared.on_tick(take_id).await {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(take_id, "Recording clock stopped");
        });
    }

    /// Advance the clock. Returns whether it should keep running.
    async fn on_tick(&self, take_id: u64) -> bool {
        let (tick, scene_index, remaining_secs) = {
            let mut session = self.session.lock().await;
            if session.take_id() != take_id {
                return false;
            }
            let tick = session.tick();
            (
                tick,
                session.scene_index().unwrap_or_default(),
                session.remaining_secs().unwrap_or_default(),
            )
        };

        match tick {
            Tick::Running(elapsed_secs) => {
                publish(
                    &self.event_tx,
                    SessionEventKind::Tick {
                        scene_index,
                        elapsed_secs,
                        remaining_secs,
                    },
                );
                true
            }
            Tick::LimitReached(elapsed_secs) => {
                publish(
                    &self.event_tx,
                    SessionEventKind::Tick {
                        scene_index,
                        elapsed_secs,
                        remaining_secs: 0,
                    },
                );
                tracing::info!(take_id, elapsed_secs, "Duration limit reached");
                let take = StoppedTake {
                    take_id,
                    scene_index,
                    elapsed_secs,
                };
                if let Err(e) = self.collect_media(take, true).await {
                    tracing::warn!(take_id, error = %e, "Auto-stop failed to collect media");
                }
                false
            }
            Tick::Idle => false,
        }
    }

    /// Stop the device and attach its file to the take, if still current.
    async fn collect_media(&self, take: StoppedTake, auto: bool) -> Result<(), SessionError> {
        self.device_stopped_for.store(take.take_id, Ordering::SeqCst);
        let media = self.device.stop_capture().await?;

        {
            let mut session = self.session.lock().await;
            if session.take_id() != take.take_id
                || session.attach_media(media) == Transition::Ignored
            {
                tracing::debug!(take_id = take.take_id, "Media for a replaced take dropped");
            }
        }

        tracing::info!(
            take_id = take.take_id,
            elapsed_secs = take.elapsed_secs,
            auto,
            "Recording stopped",
        );
        publish(
            &self.event_tx,
            SessionEventKind::RecordingStopped {
                scene_index: take.scene_index,
                take_id: take.take_id,
                elapsed_secs: take.elapsed_secs,
                auto,
            },
        );
        Ok(())
    }

    /// Apply an upload result to the session and the shared context.
    ///
    /// A result for a take that is no longer uploading is still merged into
    /// the submission map, unless a newer take of the same scene exists.
    async fn apply_upload(
        &self,
        ticket: &UploadTicket,
        meta: &SceneUploadMeta,
        result: Result<AiFeedback, UploadError>,
    ) -> UploadOutcome {
        let retryable = result.as_ref().err().is_some_and(UploadError::is_retryable);

        let (outcome, replaced) = {
            let mut session = self.session.lock().await;
            let outcome =
                session.finish_upload(ticket.take_id, result.clone().map_err(|e| e.to_string()));
            let replaced = session.scene_index() == Some(ticket.scene_index)
                && session.take_id() != 0
                && session.take_id() != ticket.take_id;
            (outcome, replaced)
        };

        match (&outcome, result) {
            (UploadOutcome::Submitted(feedback), _) => {
                self.context
                    .merge_upload_result(&meta.template_id, meta.scene_number, feedback)
                    .await;
                self.publish_success(ticket, meta, feedback.clone());
            }
            (UploadOutcome::Failed(message), _) => {
                tracing::warn!(
                    take_id = ticket.take_id,
                    scene_number = meta.scene_number,
                    retryable,
                    error = %message,
                    "Upload failed, take kept for retry",
                );
                publish(
                    &self.event_tx,
                    SessionEventKind::UploadFailed {
                        scene_number: meta.scene_number,
                        take_id: ticket.take_id,
                        message: message.clone(),
                        retryable,
                    },
                );
            }
            (UploadOutcome::Stale, Ok(feedback)) if !replaced => {
                let applied = self
                    .context
                    .merge_upload_result(&meta.template_id, meta.scene_number, &feedback)
                    .await;
                tracing::info!(
                    take_id = ticket.take_id,
                    scene_number = meta.scene_number,
                    applied,
                    "Background upload finished",
                );
                self.publish_success(ticket, meta, feedback);
            }
            (UploadOutcome::Stale, _) => {
                tracing::info!(
                    take_id = ticket.take_id,
                    scene_number = meta.scene_number,
                    "Stale upload result discarded",
                );
                publish(
                    &self.event_tx,
                    SessionEventKind::UploadDiscarded {
                        scene_number: meta.scene_number,
                        take_id: ticket.take_id,
                    },
                );
            }
        }

        outcome
    }

    fn publish_success(&self, ticket: &UploadTicket, meta: &SceneUploadMeta, feedback: AiFeedback) {
        publish(
            &self.event_tx,
            SessionEventKind::UploadSucceeded {
                scene_number: meta.scene_number,
                take_id: ticket.take_id,
                feedback,
            },
        );
    }
}
