//! Seam to the platform camera.

use async_trait::async_trait;
use shotguide_core::recording::MediaHandle;

use crate::error::CaptureError;

/// Native capture device.
///
/// Both calls are suspension points; the controller never holds session
/// state locked across them.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Begin writing a new recording.
    async fn start_capture(&self) -> Result<(), CaptureError>;

    /// Finish the current recording and hand back the file.
    async fn stop_capture(&self) -> Result<MediaHandle, CaptureError>;
}
