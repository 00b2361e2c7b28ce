//! Recording workflow for guided scene capture.
//!
//! [`RecordingController`] drives the per-scene state machine from
//! `shotguide-core` with a tokio timer, a [`CaptureDevice`] and a
//! [`SceneUploader`](shotguide_client::SceneUploader). [`SessionContext`]
//! holds the selected template and the submission map shared across
//! screens. Progress is published as [`SessionEvent`]s.

pub mod capture;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod events;

pub use capture::CaptureDevice;
pub use config::RecorderConfig;
pub use context::SessionContext;
pub use controller::RecordingController;
pub use error::{CaptureError, SessionError};
pub use events::{SessionEvent, SessionEventKind};
