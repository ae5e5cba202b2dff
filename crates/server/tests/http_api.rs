//! HTTP surface driven through the router with the offline backend

use std::io::Cursor;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::ServiceExt;
use tts_demo_config::{ModelBackend, Settings};
use tts_demo_pipeline::{FixedSpeakerFetcher, ModelProvider, SpeakerEmbeddingProvider, StubModelFetcher};
use tts_demo_server::{create_router, AppState, SpeechRequestHandler};

fn stub_app(dir: &std::path::Path) -> Router {
    let handler = SpeechRequestHandler::new(
        Arc::new(ModelProvider::new(StubModelFetcher)),
        Arc::new(SpeakerEmbeddingProvider::new(FixedSpeakerFetcher::zeros())),
        dir,
    );
    create_router(AppState::new(handler, "Hello, my dog is cute."))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_index_page() {
    let dir = tempfile::tempdir().unwrap();
    let response = stub_app(dir.path())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("Generate Speech"));
    assert!(page.contains("Hello, my dog is cute."));
}

#[tokio::test]
async fn test_speech_success() {
    let dir = tempfile::tempdir().unwrap();
    let response = stub_app(dir.path())
        .oneshot(post_json("/api/speech", json!({ "text": "Hello, my dog is cute." })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Speech generated successfully!");
    assert_eq!(body["mime_type"], "audio/wav");
    assert_eq!(body["sample_rate"], 16000);
    assert!(body["duration_secs"].as_f64().unwrap() > 0.0);

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("speech_") && filename.ends_with(".wav"));
    assert!(!dir.path().join(filename).exists());

    let wav = STANDARD.decode(body["audio_base64"].as_str().unwrap()).unwrap();
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as u64, body["num_samples"].as_u64().unwrap());
}

#[tokio::test]
async fn test_blank_text_warning() {
    let dir = tempfile::tempdir().unwrap();
    let app = stub_app(dir.path());

    for text in ["", "   "] {
        let response = app
            .clone()
            .oneshot(post_json("/api/speech", json!({ "text": text })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["status"], "warning");
        assert_eq!(body["message"], "Please enter some text before generating speech.");
    }
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_download_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let response = stub_app(dir.path())
        .oneshot(post_json("/api/speech/download", json!({ "text": "Hi there" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"speech_"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_health_reports_lazy_loading() {
    let dir = tempfile::tempdir().unwrap();
    let app = stub_app(dir.path());

    let health = |app: Router| async move {
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        json_body(response).await
    };

    let before = health(app.clone()).await;
    assert_eq!(before["models_loaded"], false);
    assert_eq!(before["speaker_loaded"], false);

    app.clone()
        .oneshot(post_json("/api/speech", json!({ "text": "Hi" })))
        .await
        .unwrap();

    let after = health(app).await;
    assert_eq!(after["models_loaded"], true);
    assert_eq!(after["speaker_loaded"], true);
}

#[tokio::test]
async fn test_missing_output_dir_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let response = stub_app(&dir.path().join("missing"))
        .oneshot(post_json("/api/speech", json!({ "text": "Hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Speech generation failed: "));
}

#[tokio::test]
async fn test_stub_backend_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.models.backend = ModelBackend::Stub;
    settings.output.dir = dir.path().to_path_buf();

    let response = create_router(AppState::from_settings(&settings))
        .oneshot(post_json("/api/speech", json!({ "text": "Offline" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let dir = tempfile::tempdir().unwrap();
    let response = stub_app(dir.path())
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
