//! Fakes for the capture device and uploader.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, Semaphore};

use shotguide_client::{SceneUploadMeta, SceneUploader, UploadError};
use shotguide_core::recording::MediaHandle;
use shotguide_core::submission::AiFeedback;
use shotguide_core::template::Template;
use shotguide_session::{
    CaptureDevice, CaptureError, RecorderConfig, RecordingController, SessionContext,
    SessionEvent, SessionEventKind,
};

pub const USER_ID: &str = "user-1";
pub const TEMPLATE_ID: &str = "tpl-1";

/// Scene 0 lasts 5 s with an object overlay; scene 1 has no duration.
pub fn template() -> Template {
    serde_json::from_value(json!({
        "_id": TEMPLATE_ID,
        "title": "Cafe tour",
        "scenes": [
            {
                "sceneTitle": "Intro",
                "scriptLine": "Welcome in",
                "sceneDurationInSeconds": 5,
                "overlayType": "objects",
                "overlayObjects": [
                    { "label": "person", "x": 0.1, "y": 0.2, "width": 0.5, "height": 0.6 }
                ]
            },
            { "sceneTitle": "Counter", "scriptLine": "Order here" }
        ]
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCamera {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub fail_start: bool,
    start_gate: Option<Semaphore>,
}

impl FakeCamera {
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    /// A camera whose start waits for [`release_start`](Self::release_start).
    pub fn slow_to_start() -> Self {
        Self {
            start_gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release_start(&self) {
        if let Some(gate) = &self.start_gate {
            gate.add_permits(1);
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn start_capture(&self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::PermissionDenied);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.start_gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(())
    }

    async fn stop_capture(&self) -> Result<MediaHandle, CaptureError> {
        let n = self.stops.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MediaHandle::new(format!("/captures/take-{n}.mp4"), "video/mp4"))
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Replays scripted results; with a gate, each upload waits for a permit.
#[derive(Default)]
pub struct FakeUploader {
    results: Mutex<VecDeque<Result<AiFeedback, UploadError>>>,
    gate: Option<Semaphore>,
    pub uploads: Mutex<Vec<SceneUploadMeta>>,
}

impl FakeUploader {
    pub fn scripted(results: Vec<Result<AiFeedback, UploadError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    pub fn gated(results: Vec<Result<AiFeedback, UploadError>>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::scripted(results)
        }
    }

    /// Let one waiting upload finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl SceneUploader for FakeUploader {
    async fn upload_scene(
        &self,
        _media: &MediaHandle,
        meta: &SceneUploadMeta,
    ) -> Result<AiFeedback, UploadError> {
        self.uploads.lock().unwrap().push(meta.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AiFeedback::default()))
    }
}

pub fn feedback(score: f64) -> AiFeedback {
    AiFeedback {
        similarity_score: Some(score),
        ai_suggestions: vec!["Smile at the end".to_string()],
    }
}

pub fn network_error() -> UploadError {
    UploadError::Network {
        message: "Network error. Check your connection and try again.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub controller: RecordingController,
    pub camera: Arc<FakeCamera>,
    pub uploader: Arc<FakeUploader>,
    pub context: Arc<SessionContext>,
    pub events: broadcast::Receiver<SessionEvent>,
}

/// Controller with the test template selected.
pub async fn harness(camera: FakeCamera, uploader: FakeUploader) -> Harness {
    let context = Arc::new(SessionContext::new(USER_ID));
    context.select_template(template()).await;
    unselected_harness(camera, uploader, context)
}

pub fn unselected_harness(
    camera: FakeCamera,
    uploader: FakeUploader,
    context: Arc<SessionContext>,
) -> Harness {
    let camera = Arc::new(camera);
    let uploader = Arc::new(uploader);
    let device: Arc<dyn CaptureDevice> = camera.clone();
    let upload: Arc<dyn SceneUploader> = uploader.clone();
    let controller =
        RecordingController::new(device, upload, Arc::clone(&context), RecorderConfig::default());
    let events = controller.subscribe();
    Harness {
        controller,
        camera,
        uploader,
        context,
        events,
    }
}

/// Next event matching `pred`, failing after two virtual minutes.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEventKind) -> bool,
) -> SessionEventKind {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event.kind) {
                return event.kind;
            }
        }
    })
    .await
    .expect("event not published")
}

/// Record scene `index` until stopped manually after `secs` seconds.
pub async fn record_take(h: &mut Harness, index: usize, secs: u64) {
    h.controller.bind_scene(index).await.unwrap();
    h.controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(secs * 1000 + 500)).await;
    h.controller.stop().await.unwrap();
}
