use shotguide_client::{ApiError, UploadError};
use shotguide_core::error::CoreError;

/// Failures reported by the capture device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera or microphone permission denied")]
    PermissionDenied,

    #[error("Capture device error: {0}")]
    Device(String),
}

/// Errors surfaced by the recording workflow.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// Message suitable for a toast or modal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(e) => e
                .user_prompt()
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string()),
            Self::Capture(e) => e.to_string(),
            Self::Upload(e) => e.to_string(),
            Self::Api(e) => e.to_string(),
        }
    }
}
