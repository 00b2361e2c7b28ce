//! Backend client for guided scene capture.
//!
//! Provides the REST client ([`api::ShotGuideApi`]), the upload pipeline
//! with its response-envelope interpretation, and environment-driven
//! configuration.

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;

pub use api::{SceneDetail, SceneUploadMeta, SceneUploader, ShotGuideApi, SubmissionSource};
pub use config::ClientConfig;
pub use error::{ApiError, UploadError, UploadErrorKind};
