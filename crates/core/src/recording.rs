//! Per-scene recording session state machine.
//!
//! ```text
//! Idle -> Recording -> Stopped -> Uploading -> Submitted
//!                        ^            |
//!                        +------------+ (upload failed, take kept)
//! ```
//!
//! The machine is synchronous and I/O free. The async controller drives
//! it from capture callbacks, the tick timer and upload results, and
//! performs the side effects each transition asks for.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::submission::AiFeedback;
use crate::template::Scene;
use crate::types::Timestamp;

/// Recording limit used when a scene declares no duration.
pub const DEFAULT_SCENE_DURATION_SECS: u32 = 30;

/// Take ids are unique for the whole process so that a late upload result
/// can never be mistaken for a take of a newer session.
static NEXT_TAKE_ID: AtomicU64 = AtomicU64::new(1);

fn next_take_id() -> u64 {
    NEXT_TAKE_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Opaque handle to a finished recording on local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    pub path: PathBuf,
    pub mime_type: String,
    pub recorded_at: Timestamp,
}

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            recorded_at: Utc::now(),
        }
    }

    /// File name used for the multipart upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene.mp4".to_string())
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Recording,
    Stopped,
    Uploading,
    Submitted,
}

/// Whether a requested transition changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Not valid from the current phase; nothing changed.
    Ignored,
}

/// Outcome of a one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still recording; carries the new elapsed time.
    Running(u32),
    /// The duration limit was reached and the session is now stopped.
    LimitReached(u32),
    /// Not recording; the tick was ignored.
    Idle,
}

/// Everything needed to upload one take.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTicket {
    pub take_id: u64,
    pub scene_index: usize,
    pub media: MediaHandle,
}

/// What happened to an upload result handed back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Submitted(AiFeedback),
    /// Upload failed; the session is back in `Stopped` with the take kept.
    Failed(String),
    /// The result belongs to a take that is no longer being uploaded.
    Stale,
}

/// The bound scene of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundScene {
    pub index: usize,
    pub duration_limit_secs: u32,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Client-local state of the scene currently on the recording screen.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    scene: Option<BoundScene>,
    phase: SessionPhase,
    elapsed_secs: u32,
    media: Option<MediaHandle>,
    take_id: u64,
    last_error: Option<String>,
    feedback: Option<AiFeedback>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::unbound()
    }
}

impl RecordingSession {
    /// A session with no scene; `start` fails with `NoTemplateSelected`.
    pub fn unbound() -> Self {
        Self {
            scene: None,
            phase: SessionPhase::Idle,
            elapsed_secs: 0,
            media: None,
            take_id: 0,
            last_error: None,
            feedback: None,
        }
    }

    /// A session for `scene`, using `default_limit_secs` when the scene
    /// declares no duration.
    pub fn for_scene(scene: &Scene, default_limit_secs: u32) -> Self {
        Self {
            scene: Some(BoundScene {
                index: scene.index,
                duration_limit_secs: scene.duration_limit_secs(default_limit_secs).max(1),
            }),
            ..Self::unbound()
        }
    }

    // ---- accessors ----

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn scene(&self) -> Option<BoundScene> {
        self.scene
    }

    pub fn scene_index(&self) -> Option<usize> {
        self.scene.map(|s| s.index)
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn remaining_secs(&self) -> Option<u32> {
        self.scene
            .map(|s| s.duration_limit_secs.saturating_sub(self.elapsed_secs))
    }

    pub fn is_recording(&self) -> bool {
        self.phase == SessionPhase::Recording
    }

    pub fn media(&self) -> Option<&MediaHandle> {
        self.media.as_ref()
    }

    pub fn take_id(&self) -> u64 {
        self.take_id
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn feedback(&self) -> Option<&AiFeedback> {
        self.feedback.as_ref()
    }

    // ---- transitions ----

    /// `Idle | Submitted -> Recording`. Starts a new take at 0 seconds.
    ///
    /// Ignored while a take is recording, stopped or uploading.
    pub fn start(&mut self) -> Result<Transition, CoreError> {
        if self.scene.is_none() {
            return Err(CoreError::NoTemplateSelected);
        }
        match self.phase {
            SessionPhase::Idle | SessionPhase::Submitted => {
                self.phase = SessionPhase::Recording;
                self.elapsed_secs = 0;
                self.take_id = next_take_id();
                self.media = None;
                self.last_error = None;
                self.feedback = None;
                Ok(Transition::Applied)
            }
            _ => Ok(Transition::Ignored),
        }
    }

    /// Advance the recording clock by one second, auto-stopping at the
    /// scene's limit.
    pub fn tick(&mut self) -> Tick {
        let Some(scene) = self.scene else {
            return Tick::Idle;
        };
        if self.phase != SessionPhase::Recording {
            return Tick::Idle;
        }
        self.elapsed_secs = self.elapsed_secs.saturating_add(1);
        if self.elapsed_secs >= scene.duration_limit_secs {
            self.phase = SessionPhase::Stopped;
            Tick::LimitReached(self.elapsed_secs)
        } else {
            Tick::Running(self.elapsed_secs)
        }
    }

    /// `Recording -> Stopped` (manual stop or stop-on-exit).
    pub fn stop(&mut self) -> Transition {
        if self.phase == SessionPhase::Recording {
            self.phase = SessionPhase::Stopped;
            Transition::Applied
        } else {
            Transition::Ignored
        }
    }

    /// Attach the file produced by the capture device to the stopped take.
    pub fn attach_media(&mut self, media: MediaHandle) -> Transition {
        if self.phase == SessionPhase::Stopped && self.media.is_none() {
            self.media = Some(media);
            Transition::Applied
        } else {
            Transition::Ignored
        }
    }

    /// Revert a start whose capture never began.
    pub fn abort_start(&mut self) -> Transition {
        if self.phase == SessionPhase::Recording {
            self.phase = SessionPhase::Idle;
            self.elapsed_secs = 0;
            Transition::Applied
        } else {
            Transition::Ignored
        }
    }

    /// `Stopped -> Uploading`. Fails with `NoActiveRecording` unless a
    /// stopped take with media exists.
    pub fn begin_upload(&mut self) -> Result<UploadTicket, CoreError> {
        let scene = self.scene.ok_or(CoreError::NoTemplateSelected)?;
        match (&self.phase, &self.media) {
            (SessionPhase::Stopped, Some(media)) => {
                let ticket = UploadTicket {
                    take_id: self.take_id,
                    scene_index: scene.index,
                    media: media.clone(),
                };
                self.phase = SessionPhase::Uploading;
                self.last_error = None;
                Ok(ticket)
            }
            _ => Err(CoreError::NoActiveRecording),
        }
    }

    /// `Uploading -> Submitted | Stopped`, guarded by the take id.
    ///
    /// On success the media handle is released; on failure it is kept so
    /// the same take can be retried.
    pub fn finish_upload(
        &mut self,
        take_id: u64,
        result: Result<AiFeedback, String>,
    ) -> UploadOutcome {
        if self.phase != SessionPhase::Uploading || take_id != self.take_id {
            return UploadOutcome::Stale;
        }
        match result {
            Ok(feedback) => {
                self.phase = SessionPhase::Submitted;
                self.media = None;
                self.feedback = Some(feedback.clone());
                UploadOutcome::Submitted(feedback)
            }
            Err(message) => {
                self.phase = SessionPhase::Stopped;
                self.last_error = Some(message.clone());
                UploadOutcome::Failed(message)
            }
        }
    }

    /// `Stopped | Submitted -> Idle`, dropping the take (re-record).
    pub fn discard(&mut self) -> Transition {
        match self.phase {
            SessionPhase::Stopped | SessionPhase::Submitted => {
                self.phase = SessionPhase::Idle;
                self.elapsed_secs = 0;
                self.media = None;
                self.last_error = None;
                Transition::Applied
            }
            _ => Transition::Ignored,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn scene(duration: Option<f64>) -> Scene {
        serde_json::from_value(json!({
            "sceneTitle": "Hook",
            "sceneDurationInSeconds": duration,
        }))
        .unwrap()
    }

    fn session(limit: f64) -> RecordingSession {
        RecordingSession::for_scene(&scene(Some(limit)), DEFAULT_SCENE_DURATION_SECS)
    }

    fn media() -> MediaHandle {
        MediaHandle::new("/tmp/take.mp4", "video/mp4")
    }

    fn stopped_with_media(limit: f64) -> RecordingSession {
        let mut s = session(limit);
        s.start().unwrap();
        s.stop();
        s.attach_media(media());
        s
    }

    // -- start ---------------------------------------------------------------

    #[test]
    fn start_without_scene_fails() {
        let mut s = RecordingSession::unbound();
        assert_matches!(s.start(), Err(CoreError::NoTemplateSelected));
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[test]
    fn start_resets_clock_and_bumps_take() {
        let mut s = session(10.0);
        assert_eq!(s.start().unwrap(), Transition::Applied);
        assert_eq!(s.phase(), SessionPhase::Recording);
        assert_eq!(s.elapsed_secs(), 0);
        assert_ne!(s.take_id(), 0);
    }

    #[test]
    fn start_while_recording_is_noop() {
        let mut s = session(10.0);
        s.start().unwrap();
        let take = s.take_id();
        s.tick();
        assert_eq!(s.start().unwrap(), Transition::Ignored);
        assert_eq!(s.elapsed_secs(), 1);
        assert_eq!(s.take_id(), take);
    }

    #[test]
    fn start_with_pending_take_is_noop() {
        let mut s = stopped_with_media(10.0);
        assert_eq!(s.start().unwrap(), Transition::Ignored);
        assert!(s.media().is_some());
    }

    // -- tick / auto-stop ----------------------------------------------------

    #[test]
    fn auto_stops_exactly_at_limit() {
        let mut s = session(5.0);
        s.start().unwrap();
        for expected in 1..=4 {
            assert_eq!(s.tick(), Tick::Running(expected));
            assert_eq!(s.phase(), SessionPhase::Recording);
        }
        assert_eq!(s.tick(), Tick::LimitReached(5));
        assert_eq!(s.phase(), SessionPhase::Stopped);
        assert_eq!(s.tick(), Tick::Idle);
        assert_eq!(s.elapsed_secs(), 5);
    }

    #[test]
    fn default_limit_applies_without_duration() {
        let s = RecordingSession::for_scene(&scene(None), 7);
        assert_eq!(s.scene().unwrap().duration_limit_secs, 7);
        assert_eq!(s.remaining_secs(), Some(7));
    }

    #[test]
    fn tick_when_idle_is_ignored() {
        let mut s = session(5.0);
        assert_eq!(s.tick(), Tick::Idle);
        assert_eq!(RecordingSession::unbound().tick(), Tick::Idle);
    }

    // -- stop / media --------------------------------------------------------

    #[test]
    fn stop_only_from_recording() {
        let mut s = session(5.0);
        assert_eq!(s.stop(), Transition::Ignored);
        s.start().unwrap();
        assert_eq!(s.stop(), Transition::Applied);
        assert_eq!(s.stop(), Transition::Ignored);
    }

    #[test]
    fn media_attaches_once_after_stop() {
        let mut s = session(5.0);
        s.start().unwrap();
        assert_eq!(s.attach_media(media()), Transition::Ignored);
        s.stop();
        assert_eq!(s.attach_media(media()), Transition::Applied);
        assert_eq!(s.attach_media(media()), Transition::Ignored);
    }

    #[test]
    fn abort_start_returns_to_idle() {
        let mut s = session(5.0);
        s.start().unwrap();
        assert_eq!(s.abort_start(), Transition::Applied);
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    // -- upload --------------------------------------------------------------

    #[test]
    fn upload_without_take_is_no_active_recording() {
        let mut s = session(5.0);
        assert_matches!(s.begin_upload(), Err(CoreError::NoActiveRecording));
        s.start().unwrap();
        s.stop();
        // Stopped but the capture device has not handed over a file yet.
        assert_matches!(s.begin_upload(), Err(CoreError::NoActiveRecording));
        assert_eq!(s.phase(), SessionPhase::Stopped);
    }

    #[test]
    fn successful_upload_releases_media() {
        let mut s = stopped_with_media(5.0);
        let ticket = s.begin_upload().unwrap();
        assert_eq!(s.phase(), SessionPhase::Uploading);
        let fb = AiFeedback {
            similarity_score: Some(0.7),
            ai_suggestions: vec![],
        };
        assert_eq!(
            s.finish_upload(ticket.take_id, Ok(fb.clone())),
            UploadOutcome::Submitted(fb.clone())
        );
        assert_eq!(s.phase(), SessionPhase::Submitted);
        assert!(s.media().is_none());
        assert_eq!(s.feedback(), Some(&fb));
    }

    #[test]
    fn failed_upload_keeps_media_for_retry() {
        let mut s = stopped_with_media(5.0);
        let ticket = s.begin_upload().unwrap();
        let outcome = s.finish_upload(ticket.take_id, Err("offline".to_string()));
        assert_eq!(outcome, UploadOutcome::Failed("offline".to_string()));
        assert_eq!(s.phase(), SessionPhase::Stopped);
        assert_eq!(s.media(), Some(&ticket.media));
        assert_eq!(s.last_error(), Some("offline"));

        let retry = s.begin_upload().unwrap();
        assert_eq!(retry.take_id, ticket.take_id);
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn stale_upload_result_is_ignored() {
        let mut s = stopped_with_media(5.0);
        let ticket = s.begin_upload().unwrap();
        assert_eq!(s.finish_upload(ticket.take_id + 1, Ok(AiFeedback::default())), UploadOutcome::Stale);
        assert_eq!(s.phase(), SessionPhase::Uploading);
        s.finish_upload(ticket.take_id, Ok(AiFeedback::default()));
        // A second result for the same take arrives late.
        assert_eq!(s.finish_upload(ticket.take_id, Err("late".into())), UploadOutcome::Stale);
        assert_eq!(s.phase(), SessionPhase::Submitted);
    }

    // -- discard -------------------------------------------------------------

    #[test]
    fn discard_drops_take() {
        let mut s = stopped_with_media(5.0);
        assert_eq!(s.discard(), Transition::Applied);
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.media().is_none());
        assert_eq!(s.elapsed_secs(), 0);
    }

    #[test]
    fn discard_ignored_while_uploading() {
        let mut s = stopped_with_media(5.0);
        s.begin_upload().unwrap();
        assert_eq!(s.discard(), Transition::Ignored);
        assert_eq!(s.phase(), SessionPhase::Uploading);
    }

    #[test]
    fn rerecord_after_submission_starts_new_take() {
        let mut s = stopped_with_media(5.0);
        let t = s.begin_upload().unwrap();
        s.finish_upload(t.take_id, Ok(AiFeedback::default()));
        assert_eq!(s.start().unwrap(), Transition::Applied);
        assert!(s.take_id() > t.take_id);
        assert!(s.feedback().is_none());
    }

    #[test]
    fn take_ids_are_unique_across_sessions() {
        let mut a = session(5.0);
        let mut b = session(5.0);
        a.start().unwrap();
        b.start().unwrap();
        assert_ne!(a.take_id(), b.take_id());
    }

    #[test]
    fn media_file_name() {
        assert_eq!(media().file_name(), "take.mp4");
        assert_eq!(MediaHandle::new("/", "video/mp4").file_name(), "scene.mp4");
    }
}
