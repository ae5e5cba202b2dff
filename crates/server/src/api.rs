//! HTTP handlers

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tts_demo_config::constants::{audio, ui};

use crate::error::{ApiError, StatusMessage};
use crate::handler::{GeneratedSpeech, RequestOutcome, RequestSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SpeechResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub filename: String,
    pub mime_type: &'static str,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub num_samples: usize,
    pub audio_base64: String,
}

impl From<GeneratedSpeech> for SpeechResponse {
    fn from(speech: GeneratedSpeech) -> Self {
        Self {
            status: "success",
            message: ui::SUCCESS_MESSAGE,
            audio_base64: STANDARD.encode(&speech.wav),
            filename: speech.filename,
            mime_type: audio::MIME_TYPE,
            sample_rate: speech.sample_rate,
            duration_secs: speech.duration_secs,
            num_samples: speech.num_samples,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models_loaded: bool,
    pub speaker_loaded: bool,
}

/// Run the request handler on a blocking worker
async fn run_request(state: &AppState, text: String) -> Result<RequestOutcome, ApiError> {
    let handler = state.handler.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut session = RequestSession::new();
        handler.handle(&mut session, &text)
    })
    .await??;
    Ok(outcome)
}

fn rejected(warning: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(StatusMessage::warning(warning)),
    )
        .into_response()
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(crate::ui::render(&state.default_text))
}

/// POST /api/speech
pub async fn speech(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, ApiError> {
    match run_request(&state, request.text).await? {
        RequestOutcome::Rejected { warning } => Ok(rejected(warning)),
        RequestOutcome::Completed(speech) => {
            Ok(Json(SpeechResponse::from(speech)).into_response())
        }
    }
}

/// POST /api/speech/download
///
/// Synthesize and download in one call, for clients without the page. This
/// is a fresh synthesis: with no seed configured the dropout draws differ, so
/// the bytes are not the ones an earlier `/api/speech` call returned. The
/// page downloads the bytes it already played and never calls this route.
pub async fn download(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, ApiError> {
    match run_request(&state, request.text).await? {
        RequestOutcome::Rejected { warning } => Ok(rejected(warning)),
        RequestOutcome::Completed(speech) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, audio::MIME_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", speech.filename),
                ),
            ],
            Body::from(speech.wav),
        )
            .into_response()),
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models_loaded: state.handler.models().is_loaded(),
        speaker_loaded: state.handler.speakers().is_loaded(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
