use anyhow::Context;
use tts_demo_config::Settings;
use tts_demo_server::{create_router, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    telemetry::init_tracing(&settings.logging);

    let mut state = AppState::from_settings(&settings);
    if let Some(handle) = telemetry::init_metrics(&settings.metrics) {
        state = state.with_metrics(handle);
    }

    tracing::info!(
        backend = ?settings.models.backend,
        model = %settings.models.tts_model_id,
        vocoder = %settings.models.vocoder_id,
        speaker_index = settings.speaker.index,
        output_dir = %settings.output.dir.display(),
        "Starting text-to-speech demo"
    );

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
