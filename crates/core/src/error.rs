/// Domain errors for overlay geometry, scene data and recording sessions.
///
/// Geometry and overlay-data variants are recovered inside the projector
/// and never reach the UI. Session variants are surfaced as blocking
/// prompts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Malformed overlay data: {0}")]
    MalformedOverlayData(String),

    #[error("No template selected")]
    NoTemplateSelected,

    #[error("No active recording to submit")]
    NoActiveRecording,

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Text shown to the user for session precondition failures.
    ///
    /// Returns `None` for variants that are recovered locally and must
    /// never be shown.
    pub fn user_prompt(&self) -> Option<&'static str> {
        match self {
            Self::NoTemplateSelected => Some("Select a template before recording."),
            Self::NoActiveRecording => Some("There is nothing to submit yet."),
            Self::InvalidGeometry(_) | Self::MalformedOverlayData(_) | Self::Validation(_) => None,
        }
    }
}
