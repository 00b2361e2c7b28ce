//! The backend's `{success, data, error, message}` response envelope.
//!
//! Interpretation is pure so every status/body combination can be tested
//! without a server.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use shotguide_core::submission::AiFeedback;

use crate::error::{ApiError, UploadError, GENERIC_UPLOAD_MESSAGE};

/// Envelope wrapping every backend response.
///
/// `error` and `message` are kept as raw JSON because the backend sends
/// either strings or nested objects there.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl<T> Envelope<T> {
    /// Best human-readable message: `error`, else `message`.
    pub fn best_message(&self) -> Option<String> {
        text_of(self.error.as_ref()).or_else(|| text_of(self.message.as_ref()))
    }
}

/// Extract display text from a string or `{ "message": "..." }` value.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Upload responses
// ---------------------------------------------------------------------------

/// Interpret the response to `POST /scenes/upload`.
///
/// Only HTTP 200 with `success=true` is a success; missing `data` yields
/// empty feedback. Everything else becomes an [`UploadError`] carrying the
/// best available message.
pub fn interpret_upload_response(status: u16, body: &str) -> Result<AiFeedback, UploadError> {
    let envelope: Envelope<Value> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(status, error = %e, "Upload response is not a valid envelope");
            return Err(UploadError::ResponseParseError {
                status,
                message: GENERIC_UPLOAD_MESSAGE.to_string(),
            });
        }
    };

    if status != 200 || !envelope.success {
        let message = envelope
            .best_message()
            .unwrap_or_else(|| GENERIC_UPLOAD_MESSAGE.to_string());
        return Err(UploadError::ServerRejected { status, message });
    }

    match envelope.data {
        None | Some(Value::Null) => Ok(AiFeedback::default()),
        Some(data) => serde_json::from_value(data).map_err(|e| {
            tracing::warn!(status, error = %e, "Upload feedback has an unexpected shape");
            UploadError::ResponseParseError {
                status,
                message: GENERIC_UPLOAD_MESSAGE.to_string(),
            }
        }),
    }
}

// ---------------------------------------------------------------------------
// JSON endpoints
// ---------------------------------------------------------------------------

/// Decode the body of a JSON endpoint into `T`.
///
/// Bodies carrying a boolean `success` are unwrapped as envelopes; any other
/// JSON value is taken as the payload itself.
pub fn decode_payload<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ApiError::Envelope(e.to_string()))?;

    let is_envelope = value
        .get("success")
        .map(Value::is_boolean)
        .unwrap_or(false);

    if !is_envelope {
        if !(200..300).contains(&status) {
            return Err(ApiError::Api {
                status,
                message: text_of(value.get("error"))
                    .or_else(|| text_of(value.get("message")))
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }
        return serde_json::from_value(value).map_err(|e| ApiError::Envelope(e.to_string()));
    }

    let envelope: Envelope<Value> =
        serde_json::from_value(value).map_err(|e| ApiError::Envelope(e.to_string()))?;

    if !(200..300).contains(&status) || !envelope.success {
        return Err(ApiError::Api {
            status,
            message: envelope
                .best_message()
                .unwrap_or_else(|| format!("HTTP {status}")),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| ApiError::Envelope("envelope has no data".to_string()))?;
    serde_json::from_value(data).map_err(|e| ApiError::Envelope(e.to_string()))
}
