//! REST client for the guided-capture backend.
//!
//! Wraps template retrieval, submission lookup, scene detail and the
//! multipart scene upload using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use serde::{Deserialize, Serialize};
use shotguide_core::recording::MediaHandle;
use shotguide_core::submission::{AiFeedback, SubmissionRecord, SubmittedVideos};
use shotguide_core::template::Template;
use shotguide_core::types::SceneNumber;
use tokio_util::io::ReaderStream;

use crate::config::ClientConfig;
use crate::envelope::{decode_payload, interpret_upload_response};
use crate::error::{ApiError, UploadError};

/// Header carrying the per-attempt correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fixed metadata sent with every scene upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneUploadMeta {
    pub template_id: String,
    pub user_id: String,
    /// 1-based scene number.
    pub scene_number: SceneNumber,
    pub scene_title: String,
}

/// Body of `GET /scenes/{sceneId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDetail {
    #[serde(flatten)]
    pub record: SubmissionRecord,
    #[serde(default)]
    pub video_signed_url: Option<String>,
}

/// Anything that can submit a recorded take for review.
#[async_trait]
pub trait SceneUploader: Send + Sync {
    async fn upload_scene(
        &self,
        media: &MediaHandle,
        meta: &SceneUploadMeta,
    ) -> Result<AiFeedback, UploadError>;
}

/// Source of the server's submission records for a user and template.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn submitted_videos(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<SubmittedVideos, ApiError>;
}

/// HTTP client for the backend API.
#[derive(Clone)]
pub struct ShotGuideApi {
    client: reqwest::Client,
    base: Url,
    api_token: Option<String>,
    upload_timeout: Duration,
}

impl ShotGuideApi {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("shotguide/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| ApiError::InvalidUrl(format!("'{}': {e}", config.api_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!(
                "'{}' cannot carry a path",
                config.api_url
            )));
        }
        Ok(Self {
            client,
            base,
            api_token: config.api_token.clone(),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    pub fn api_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Base URL with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `with_client`: the base can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetch a template with its scenes (`GET /templates/{id}`).
    pub async fn get_template(&self, template_id: &str) -> Result<Template, ApiError> {
        let response = self
            .authorized(self.client.get(self.endpoint(&["templates", template_id])))
            .send()
            .await?;

        let template: Template = Self::parse_response(response).await?;
        tracing::debug!(
            template_id = %template.id,
            scenes = template.scenes.len(),
            "Fetched template",
        );
        Ok(template)
    }

    /// Fetch submission records (`GET /submitted-videos/{userId_templateId}`).
    ///
    /// A 404 means nothing was submitted yet and yields an empty map.
    pub async fn get_submitted_videos(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<SubmittedVideos, ApiError> {
        let key = format!("{user_id}_{template_id}");
        let response = self
            .authorized(self.client.get(self.endpoint(&["submitted-videos", &key])))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(user_id, template_id, "No submissions yet");
            return Ok(SubmittedVideos::default());
        }

        Self::parse_response(response).await
    }

    /// Fetch one submitted scene with its signed video URL
    /// (`GET /scenes/{sceneId}`).
    pub async fn get_scene(&self, scene_id: &str) -> Result<SceneDetail, ApiError> {
        let response = self
            .authorized(self.client.get(self.endpoint(&["scenes", scene_id])))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Upload a recorded take (`POST /scenes/upload`).
    ///
    /// The media file is streamed from disk, never loaded whole. The
    /// handle is only read; the caller keeps it until this returns `Ok`.
    pub async fn upload(
        &self,
        media: &MediaHandle,
        meta: &SceneUploadMeta,
    ) -> Result<AiFeedback, UploadError> {
        let request_id = uuid::Uuid::new_v4().to_string();

        let unreadable = |e: std::io::Error| {
            tracing::warn!(
                request_id = %request_id,
                path = %media.path.display(),
                error = %e,
                "Recorded media is unreadable",
            );
            UploadError::MediaUnreadable {
                message: format!("Could not read the recording: {e}"),
            }
        };
        let media_file = tokio::fs::File::open(&media.path).await.map_err(unreadable)?;
        let size = media_file.metadata().await.map_err(unreadable)?.len();

        let body = Body::wrap_stream(ReaderStream::new(media_file));
        let file = Part::stream_with_length(body, size)
            .file_name(media.file_name())
            .mime_str(&media.mime_type)
            .map_err(|e| UploadError::MediaUnreadable {
                message: format!("Invalid media type '{}': {e}", media.mime_type),
            })?;

        let form = Form::new()
            .part("file", file)
            .text("templateId", meta.template_id.clone())
            .text("userId", meta.user_id.clone())
            .text("sceneNumber", meta.scene_number.to_string())
            .text("sceneTitle", meta.scene_title.clone());

        tracing::info!(
            request_id = %request_id,
            scene_number = meta.scene_number,
            bytes = size,
            "Uploading scene",
        );

        let response = self
            .authorized(self.client.post(self.endpoint(&["scenes", "upload"])))
            .header(REQUEST_ID_HEADER, &request_id)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::network(&e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| UploadError::network(&e))?;

        match interpret_upload_response(status, &body) {
            Ok(feedback) => {
                tracing::info!(
                    request_id = %request_id,
                    scene_number = meta.scene_number,
                    similarity = ?feedback.similarity_score,
                    "Scene upload accepted",
                );
                Ok(feedback)
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    scene_number = meta.scene_number,
                    status,
                    error = %e,
                    "Scene upload failed",
                );
                Err(e)
            }
        }
    }

    // ---- private helpers ----

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Read the body and decode it, unwrapping the envelope when present.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_payload(status, &body)
    }
}

#[async_trait]
impl SceneUploader for ShotGuideApi {
    async fn upload_scene(
        &self,
        media: &MediaHandle,
        meta: &SceneUploadMeta,
    ) -> Result<AiFeedback, UploadError> {
        self.upload(media, meta).await
    }
}

#[async_trait]
impl SubmissionSource for ShotGuideApi {
    async fn submitted_videos(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<SubmittedVideos, ApiError> {
        self.get_submitted_videos(user_id, template_id).await
    }
}
