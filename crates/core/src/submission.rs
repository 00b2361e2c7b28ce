//! Scene submission tracking.
//!
//! Merges a template's scenes with the server's per-scene submission map
//! into per-scene statuses and aggregate progress. Everything here is
//! pure: the same inputs always produce the same statuses, however often
//! and in whatever order they are recomputed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::template::Scene;
use crate::types::SceneNumber;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";

/// All status values the server is known to send.
pub const VALID_STATUSES: &[&str] = &[STATUS_PENDING, STATUS_APPROVED, STATUS_REJECTED];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Server-owned record of an uploaded take, keyed by 1-based scene number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionRecord {
    pub scene_number: Option<SceneNumber>,
    pub status: Option<String>,
    pub similarity_score: Option<f64>,
    pub ai_suggestions: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub scene_id: Option<String>,
}

/// AI review result returned by a successful upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiFeedback {
    /// Similarity to the template scene in `[0, 1]`.
    pub similarity_score: Option<f64>,
    pub ai_suggestions: Vec<String>,
}

impl AiFeedback {
    /// Similarity as a whole percentage, clamped to 0..=100.
    pub fn similarity_percent(&self) -> Option<u8> {
        self.similarity_score
            .filter(|s| s.is_finite())
            .map(|s| (s.clamp(0.0, 1.0) * 100.0).round() as u8)
    }
}

/// Body of `GET /submitted-videos/{userId_templateId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmittedVideos {
    pub scenes: BTreeMap<SceneNumber, SubmissionRecord>,
    pub progress: Option<serde_json::Value>,
    pub publish_status: Option<String>,
    pub compiled_video_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// Review state of one scene as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl SubmissionState {
    /// Derive the state of a scene from its (possibly absent) record.
    ///
    /// A record without a status means a take exists server-side but has
    /// not been reviewed yet, so it counts as pending. Unknown status
    /// strings are treated the same way.
    pub fn from_record(record: Option<&SubmissionRecord>) -> Self {
        let Some(record) = record else {
            return Self::NotSubmitted;
        };
        match record
            .status
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some(STATUS_APPROVED) => Self::Approved,
            Some(STATUS_REJECTED) => Self::Rejected,
            Some(STATUS_PENDING) | None => Self::Pending,
            Some(other) => {
                tracing::debug!(status = other, "Unknown submission status, treating as pending");
                Self::Pending
            }
        }
    }

    pub fn affordance(&self) -> RecordAffordance {
        match self {
            Self::NotSubmitted => RecordAffordance::Record,
            Self::Pending | Self::Approved => RecordAffordance::ReRecord,
            Self::Rejected => RecordAffordance::FixAndReRecord,
        }
    }
}

/// What the record button offers for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAffordance {
    Record,
    ReRecord,
    FixAndReRecord,
}

impl RecordAffordance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Record => "Record",
            Self::ReRecord => "Re-record",
            Self::FixAndReRecord => "Fix and re-record",
        }
    }
}

/// Per-scene status for the scene list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneStatus {
    pub scene_index: usize,
    pub scene_number: SceneNumber,
    pub title: String,
    pub state: SubmissionState,
    pub affordance: RecordAffordance,
    pub similarity_score: Option<f64>,
    pub ai_suggestions: Vec<String>,
    pub video_url: Option<String>,
    pub scene_id: Option<String>,
}

/// Aggregate progress across all scenes of a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionProgress {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    pub not_submitted: usize,
    /// `approved / total * 100`, rounded. 0 for an empty template.
    pub completion_percentage: u8,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Merge scenes with the server's submission map.
pub fn reconcile(
    scenes: &[Scene],
    submissions: &BTreeMap<SceneNumber, SubmissionRecord>,
) -> Vec<SceneStatus> {
    scenes
        .iter()
        .enumerate()
        .map(|(index, scene)| {
            let scene_number = index as SceneNumber + 1;
            let record = submissions.get(&scene_number);
            let state = SubmissionState::from_record(record);
            SceneStatus {
                scene_index: index,
                scene_number,
                title: scene.title.clone(),
                state,
                affordance: state.affordance(),
                similarity_score: record.and_then(|r| r.similarity_score),
                ai_suggestions: record
                    .and_then(|r| r.ai_suggestions.clone())
                    .unwrap_or_default(),
                video_url: record.and_then(|r| r.video_url.clone()),
                scene_id: record.and_then(|r| r.scene_id.clone()),
            }
        })
        .collect()
}

/// Compute the completion percentage. Returns 0 if `total` is 0.
pub fn compute_completion_pct(total: usize, approved: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (approved as f64 / total as f64 * 100.0).round() as u8;
    pct.min(100)
}

/// Count statuses into aggregate progress.
pub fn summarize(statuses: &[SceneStatus]) -> SubmissionProgress {
    let mut progress = SubmissionProgress {
        total: statuses.len(),
        ..Default::default()
    };
    for status in statuses {
        match status.state {
            SubmissionState::Approved => progress.approved += 1,
            SubmissionState::Pending => progress.pending += 1,
            SubmissionState::Rejected => progress.rejected += 1,
            SubmissionState::NotSubmitted => progress.not_submitted += 1,
        }
    }
    progress.completion_percentage = compute_completion_pct(progress.total, progress.approved);
    progress
}

/// Index of the next scene after `from_index` that still needs a take
/// (anything but approved), wrapping around. `None` when all are approved.
pub fn next_scene_to_record(statuses: &[SceneStatus], from_index: usize) -> Option<usize> {
    let n = statuses.len();
    (1..=n)
        .map(|step| (from_index + step) % n)
        .find(|&i| statuses[i].state != SubmissionState::Approved)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Client copy of the per-scene submission map.
///
/// Mutations return a new snapshot so that readers holding the previous
/// one never observe a half-applied update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionSnapshot {
    records: BTreeMap<SceneNumber, SubmissionRecord>,
}

impl SubmissionSnapshot {
    pub fn new(records: BTreeMap<SceneNumber, SubmissionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &BTreeMap<SceneNumber, SubmissionRecord> {
        &self.records
    }

    pub fn get(&self, scene_number: SceneNumber) -> Option<&SubmissionRecord> {
        self.records.get(&scene_number)
    }

    /// Apply fresh AI feedback for an uploaded scene as a pending record.
    ///
    /// Existing `video_url`/`scene_id` are kept until the next fetch.
    pub fn merge_upload_result(&self, scene_number: SceneNumber, feedback: &AiFeedback) -> Self {
        let mut records = self.records.clone();
        let entry = records.entry(scene_number).or_default();
        entry.scene_number = Some(scene_number);
        entry.status = Some(STATUS_PENDING.to_string());
        entry.similarity_score = feedback.similarity_score;
        entry.ai_suggestions = Some(feedback.ai_suggestions.clone());
        Self { records }
    }

    /// Drop the review outcome of a scene the user is about to re-record.
    pub fn clear_for_rerecord(&self, scene_number: SceneNumber) -> Self {
        let mut records = self.records.clone();
        if let Some(entry) = records.get_mut(&scene_number) {
            entry.status = None;
            entry.similarity_score = None;
            entry.ai_suggestions = None;
        }
        Self { records }
    }

    pub fn statuses(&self, scenes: &[Scene]) -> Vec<SceneStatus> {
        reconcile(scenes, &self.records)
    }
}

impl From<SubmittedVideos> for SubmissionSnapshot {
    fn from(videos: SubmittedVideos) -> Self {
        Self::new(videos.scenes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
