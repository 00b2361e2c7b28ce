//! Shared template and submission state for the capture screens.
//!
//! Readers always get a whole snapshot; writers swap the `Arc` so a
//! background upload can never leave a half-applied map behind.

use std::sync::Arc;

use shotguide_client::SubmissionSource;
use shotguide_core::error::CoreError;
use shotguide_core::submission::{
    next_scene_to_record, summarize, AiFeedback, SceneStatus, SubmissionProgress,
    SubmissionSnapshot,
};
use shotguide_core::template::Template;
use shotguide_core::types::SceneNumber;
use tokio::sync::RwLock;

use crate::error::SessionError;

/// The selected template and the submission map that belongs to it.
///
/// Both live in one value so a reader never sees one template's records
/// under another template.
#[derive(Default)]
struct ContextState {
    template: Option<Arc<Template>>,
    submissions: Arc<SubmissionSnapshot>,
}

impl ContextState {
    fn is_template(&self, template_id: &str) -> bool {
        self.template.as_ref().is_some_and(|t| t.id == template_id)
    }
}

/// Template selection plus the client copy of the submission map.
pub struct SessionContext {
    user_id: String,
    state: RwLock<Arc<ContextState>>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: RwLock::new(Arc::new(ContextState::default())),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Select a template. Submissions from a previous template are dropped.
    pub async fn select_template(&self, template: Template) {
        tracing::info!(
            template_id = %template.id,
            scenes = template.scenes.len(),
            "Template selected",
        );
        *self.state.write().await = Arc::new(ContextState {
            template: Some(Arc::new(template)),
            submissions: Arc::new(SubmissionSnapshot::default()),
        });
    }

    pub async fn template(&self) -> Option<Arc<Template>> {
        self.state.read().await.template.clone()
    }

    /// The selected template, or `NoTemplateSelected`.
    pub async fn require_template(&self) -> Result<Arc<Template>, CoreError> {
        self.template().await.ok_or(CoreError::NoTemplateSelected)
    }

    pub async fn submissions(&self) -> Arc<SubmissionSnapshot> {
        self.state.read().await.submissions.clone()
    }

    /// Atomically replace the submission map of the selected template.
    pub async fn replace_submissions(&self, snapshot: SubmissionSnapshot) {
        let mut guard = self.state.write().await;
        let next = ContextState {
            template: guard.template.clone(),
            submissions: Arc::new(snapshot),
        };
        *guard = Arc::new(next);
    }

    /// Re-fetch submissions for the selected template and replace the map.
    ///
    /// A response that arrives after the selection changed is dropped.
    pub async fn refresh(&self, source: &dyn SubmissionSource) -> Result<(), SessionError> {
        let template = self.require_template().await?;
        let videos = source.submitted_videos(&self.user_id, &template.id).await?;

        let mut guard = self.state.write().await;
        let still_selected = guard
            .template
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &template));
        if !still_selected {
            tracing::debug!(template_id = %template.id, "Template changed during refresh, dropping result");
            return Ok(());
        }

        tracing::debug!(
            template_id = %template.id,
            records = videos.scenes.len(),
            "Submissions refreshed",
        );
        *guard = Arc::new(ContextState {
            template: Some(template),
            submissions: Arc::new(videos.into()),
        });
        Ok(())
    }

    /// Optimistically record fresh feedback for one uploaded scene.
    ///
    /// Returns `false` (and changes nothing) when the upload belonged to a
    /// template that is no longer selected.
    pub async fn merge_upload_result(
        &self,
        template_id: &str,
        scene_number: SceneNumber,
        feedback: &AiFeedback,
    ) -> bool {
        self.update_submissions(template_id, |snapshot| {
            snapshot.merge_upload_result(scene_number, feedback)
        })
        .await
    }

    /// Optimistically clear a scene's review outcome on re-record intent.
    pub async fn clear_for_rerecord(&self, template_id: &str, scene_number: SceneNumber) -> bool {
        self.update_submissions(template_id, |snapshot| {
            snapshot.clear_for_rerecord(scene_number)
        })
        .await
    }

    /// Per-scene status for the selected template (empty when none).
    pub async fn statuses(&self) -> Vec<SceneStatus> {
        let state = self.state.read().await.clone();
        match &state.template {
            Some(template) => state.submissions.statuses(&template.scenes),
            None => Vec::new(),
        }
    }

    pub async fn progress(&self) -> SubmissionProgress {
        summarize(&self.statuses().await)
    }

    /// Next scene after `from_index` that still needs a take.
    pub async fn next_scene(&self, from_index: usize) -> Option<usize> {
        next_scene_to_record(&self.statuses().await, from_index)
    }

    /// Derive a new map under the write lock, if `template_id` is selected.
    async fn update_submissions(
        &self,
        template_id: &str,
        derive: impl FnOnce(&SubmissionSnapshot) -> SubmissionSnapshot,
    ) -> bool {
        let mut guard = self.state.write().await;
        if !guard.is_template(template_id) {
            return false;
        }
        let next = ContextState {
            template: guard.template.clone(),
            submissions: Arc::new(derive(guard.submissions.as_ref())),
        };
        *guard = Arc::new(next);
        true
    }
}
