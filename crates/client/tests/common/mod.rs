//! In-process mock of the backend used by the client integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use shotguide_client::ClientConfig;

pub const TEMPLATE_ID: &str = "tpl-1";
pub const USER_ID: &str = "user-1";

/// One multipart upload as the server saw it.
#[derive(Debug, Clone, Default)]
pub struct ReceivedUpload {
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_content_type: Option<String>,
    pub file_len: usize,
    pub request_id: Option<String>,
    pub authorization: Option<String>,
}

/// Shared state: recorded uploads plus the canned upload reply.
#[derive(Clone)]
pub struct MockBackend {
    pub uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
    upload_reply: Arc<Mutex<(StatusCode, String)>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            uploads: Arc::default(),
            upload_reply: Arc::new(Mutex::new((
                StatusCode::OK,
                json!({
                    "success": true,
                    "data": { "similarityScore": 0.91, "aiSuggestions": ["Keep the phone level"] }
                })
                .to_string(),
            ))),
        }
    }
}

impl MockBackend {
    /// Replace the reply sent to the next uploads.
    pub fn reply_with(&self, status: StatusCode, body: impl Into<String>) {
        *self.upload_reply.lock().unwrap() = (status, body.into());
    }

    pub fn received(&self) -> Vec<ReceivedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

/// Start the mock on an ephemeral port and return its `/api` base URL.
pub async fn spawn_backend(backend: MockBackend) -> String {
    let api = Router::new()
        .route("/templates/{id}", get(template))
        .route("/submitted-videos/{key}", get(submitted_videos))
        .route("/scenes/upload", post(upload))
        .route("/scenes/{id}", get(scene_detail));

    let app = Router::new().nest("/api", api).with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/api")
}

/// Config for a running mock with a bearer token.
pub fn test_config(api_url: &str) -> ClientConfig {
    ClientConfig {
        api_token: Some("test-token".to_string()),
        request_timeout_secs: 5,
        upload_timeout_secs: 10,
        ..ClientConfig::with_url(api_url)
    }
}

/// URL of a port that nothing listens on.
pub async fn dead_api_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api")
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn template(Path(id): Path<String>) -> impl IntoResponse {
    if id != TEMPLATE_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Template not found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "_id": TEMPLATE_ID,
                "title": "Cafe tour",
                "scenes": [
                    {
                        "sceneTitle": "Intro",
                        "scriptLine": "Welcome in",
                        "sceneDurationInSeconds": 5,
                        "overlayType": "objects",
                        "sourceAspect": "9:16",
                        "overlayObjects": [
                            { "label": "person", "x": 0.1, "y": 0.2, "width": 0.5, "height": 0.6 }
                        ]
                    },
                    {
                        "sceneTitle": "Counter",
                        "scriptLine": "Order here",
                        "screenGridOverlay": [5]
                    }
                ]
            }
        })),
    )
}

async fn submitted_videos(Path(key): Path<String>) -> impl IntoResponse {
    if key != format!("{USER_ID}_{TEMPLATE_ID}") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "No submissions" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "scenes": {
                "1": { "sceneNumber": 1, "status": "approved", "similarityScore": 0.88, "sceneId": "s-1" }
            },
            "publishStatus": "draft"
        })),
    )
}

async fn scene_detail(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "sceneNumber": 1,
            "status": "rejected",
            "aiSuggestions": ["Too dark"],
            "sceneId": id,
            "videoSignedUrl": "https://cdn.test/scene.mp4?sig=abc"
        }
    }))
}

async fn upload(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut received = ReceivedUpload {
        request_id: header("x-request-id"),
        authorization: header(AUTHORIZATION.as_str()),
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            received.file_name = field.file_name().map(str::to_string);
            received.file_content_type = field.content_type().map(str::to_string);
            received.file_len = field.bytes().await.unwrap().len();
        } else {
            let text = field.text().await.unwrap();
            received.fields.insert(name, text);
        }
    }

    backend.uploads.lock().unwrap().push(received);

    let (status, body) = backend.upload_reply.lock().unwrap().clone();
    (status, [(CONTENT_TYPE, "application/json")], body)
}
