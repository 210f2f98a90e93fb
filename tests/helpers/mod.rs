//! Test helper utilities: a black-box app server on an ephemeral port, a
//! mock Workers AI / Europe PMC backend, and the client-side poll loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::sleep;
use uuid::Uuid;

use nutriscan::app_state::AppState;
use nutriscan::routes::build_app;
use nutriscan::services::{inference::InferenceClient, references::ReferenceClient};
use nutriscan::store::JobStore;

/// Minimal bytes that `image::guess_format` recognizes as PNG.
pub fn fake_png() -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// Canned behavior for the mock inference/reference backend.
#[derive(Clone)]
pub struct MockBackend {
    pub inference_status: u16,
    pub description: String,
    pub serve_references: bool,
}

impl MockBackend {
    pub fn ok(description: impl Into<String>) -> Self {
        Self {
            inference_status: 200,
            description: description.into(),
            serve_references: true,
        }
    }
}

async fn mock_inference(State(mock): State<Arc<MockBackend>>) -> (StatusCode, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(mock.inference_status).unwrap();
    (
        status,
        Json(json!({ "result": { "description": mock.description } })),
    )
}

async fn mock_reference_search(
    State(mock): State<Arc<MockBackend>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if mock.serve_references {
        (
            StatusCode::OK,
            Json(json!({
                "resultList": {
                    "result": [
                        { "id": "31267783", "source": "MED",
                          "title": "Dietary exposure and health outcomes: a review" }
                    ]
                }
            })),
        )
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "no results" })))
    }
}

/// The app under test plus its mock external backend, both bound to
/// ephemeral ports.
pub struct TestServer {
    pub base_url: String,
    app_handle: tokio::task::JoinHandle<()>,
    mock_handle: tokio::task::JoinHandle<()>,
    _spool: TempDir,
}

impl TestServer {
    pub async fn spawn(mock: MockBackend) -> Self {
        Self::spawn_with_retention(mock, Duration::from_secs(3600)).await
    }

    pub async fn spawn_with_retention(mock: MockBackend, retention: Duration) -> Self {
        // Mock Workers AI + Europe PMC backend
        let mock_router = Router::new()
            .route("/accounts/{account}/ai/run/{*model}", post(mock_inference))
            .route("/search", get(mock_reference_search))
            .with_state(Arc::new(mock));

        let mock_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock backend port");
        let mock_base = format!("http://{}", mock_listener.local_addr().unwrap());
        let mock_handle = tokio::spawn(async move {
            axum::serve(mock_listener, mock_router).await.unwrap();
        });

        // App under test, with a throwaway spool
        let spool = tempfile::tempdir().expect("failed to create spool dir");
        let store = Arc::new(
            JobStore::open(spool.path(), retention)
                .await
                .expect("failed to open job store"),
        );

        let inference = InferenceClient::new(
            &mock_base,
            "test-account",
            "test-token",
            Duration::from_secs(5),
        )
        .expect("failed to build inference client");
        let references =
            ReferenceClient::new(&mock_base).expect("failed to build reference client");

        let app = build_app(AppState::new(store, inference, references));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let app_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            app_handle,
            mock_handle,
            _spool: spool,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.app_handle.abort();
        self.mock_handle.abort();
    }
}

/// Response from POST /api/v1/analyze
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// A job record as returned by GET /api/v1/analyze/{job_id}
#[derive(Debug, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Upload an image to the analyze endpoint
pub async fn submit_image(
    client: &reqwest::Client,
    base_url: &str,
    image_bytes: Vec<u8>,
) -> Result<SubmitResponse, Box<dyn std::error::Error + Send + Sync>> {
    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(image_bytes)
            .file_name("label.png")
            .mime_str("image/png")?,
    );

    let response = client
        .post(format!("{base_url}/api/v1/analyze"))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {status}: {error_text}").into());
    }

    Ok(response.json::<SubmitResponse>().await?)
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_until_terminal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobRecord, Box<dyn std::error::Error + Send + Sync>> {
    let max_attempts = timeout_secs * 20; // poll every 50ms

    for _ in 0..max_attempts {
        let response = client
            .get(format!("{base_url}/api/v1/analyze/{job_id}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {error_text}").into());
        }

        let record = response.json::<JobRecord>().await?;
        match record.status.as_str() {
            "completed" | "failed" => return Ok(record),
            "pending" | "processing" => sleep(Duration::from_millis(50)).await,
            other => return Err(format!("Unknown job status: {other}").into()),
        }
    }

    Err(format!("Job did not complete within {timeout_secs} seconds").into())
}
