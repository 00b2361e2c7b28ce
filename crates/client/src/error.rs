//! Error types for the backend client.

/// Fallback shown when the server gives no usable message.
pub const GENERIC_UPLOAD_MESSAGE: &str = "Upload failed. Please try again.";

/// Shown for connectivity failures.
pub const NETWORK_MESSAGE: &str = "Network error. Check your connection and try again.";

/// Errors from the JSON endpoints (template, submissions, scene detail).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status or `success=false`.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Best available message from the payload.
        message: String,
    },

    /// The body did not match the expected envelope or payload shape.
    #[error("Malformed response: {0}")]
    Envelope(String),

    /// The configured base URL cannot be used to build endpoint paths.
    #[error("Invalid API URL {0}")]
    InvalidUrl(String),
}

/// Coarse classification of an upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// No response was received.
    Network,
    /// Non-200 status, or `success=false` in the envelope.
    ServerRejected,
    /// The body was not a valid envelope.
    ResponseParseError,
    /// The recorded file could not be read.
    MediaUnreadable,
}

/// Failure of a single upload attempt.
///
/// `Display` yields the user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("{message}")]
    Network { message: String },

    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    #[error("{message}")]
    ResponseParseError { status: u16, message: String },

    #[error("{message}")]
    MediaUnreadable { message: String },
}

impl UploadError {
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            Self::Network { .. } => UploadErrorKind::Network,
            Self::ServerRejected { .. } => UploadErrorKind::ServerRejected,
            Self::ResponseParseError { .. } => UploadErrorKind::ResponseParseError,
            Self::MediaUnreadable { .. } => UploadErrorKind::MediaUnreadable,
        }
    }

    /// Only connectivity failures are worth an automatic retry prompt.
    /// Server rejections are terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == UploadErrorKind::Network
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerRejected { status, .. } | Self::ResponseParseError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub(crate) fn network(err: &reqwest::Error) -> Self {
        tracing::debug!(error = %err, "Upload transport failure");
        Self::Network {
            message: NETWORK_MESSAGE.to_string(),
        }
    }
}
