//! Session events published on a `tokio::sync::broadcast` channel.

use chrono::Utc;
use serde::Serialize;
use shotguide_core::submission::AiFeedback;
use shotguide_core::types::{SceneNumber, Timestamp};
use tokio::sync::broadcast;

/// Broadcast channel capacity for session events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What happened in the recording workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEventKind {
    RecordingStarted {
        scene_index: usize,
        take_id: u64,
        limit_secs: u32,
    },
    Tick {
        scene_index: usize,
        elapsed_secs: u32,
        remaining_secs: u32,
    },
    RecordingStopped {
        scene_index: usize,
        take_id: u64,
        elapsed_secs: u32,
        /// `true` when the duration limit stopped the take.
        auto: bool,
    },
    UploadStarted {
        scene_number: SceneNumber,
        take_id: u64,
    },
    UploadSucceeded {
        scene_number: SceneNumber,
        take_id: u64,
        feedback: AiFeedback,
    },
    UploadFailed {
        scene_number: SceneNumber,
        take_id: u64,
        message: String,
        retryable: bool,
    },
    /// A late result for a take that was replaced; nothing was applied.
    UploadDiscarded {
        scene_number: SceneNumber,
        take_id: u64,
    },
    TakeDiscarded {
        scene_index: usize,
    },
}

/// A timestamped [`SessionEventKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEvent {
    #[serde(flatten)]
    pub kind: SessionEventKind,
    pub timestamp: Timestamp,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Publish without caring whether anyone listens.
pub(crate) fn publish(tx: &broadcast::Sender<SessionEvent>, kind: SessionEventKind) {
    // A SendError only means there are zero receivers.
    let _ = tx.send(SessionEvent::new(kind));
}
