//! Shared application state

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tts_demo_config::{ModelBackend, Settings};
use tts_demo_pipeline::{
    DatasetSpeakerFetcher, FixedSpeakerFetcher, HubModelFetcher, ModelProvider,
    NpyFileSpeakerFetcher, SpeakerEmbeddingProvider, StubModelFetcher,
};

use crate::handler::SpeechRequestHandler;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<SpeechRequestHandler>,
    /// Text pre-filled in the page
    pub default_text: Arc<str>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(handler: SpeechRequestHandler, default_text: impl Into<Arc<str>>) -> Self {
        Self {
            handler: Arc::new(handler),
            default_text: default_text.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Wire providers for the configured backend
    ///
    /// Nothing is fetched here; models and the voice load on first request.
    pub fn from_settings(settings: &Settings) -> Self {
        let models = match settings.models.backend {
            ModelBackend::Speecht5 => ModelProvider::new(HubModelFetcher::new(
                settings.models.clone(),
                settings.generation.clone(),
            )),
            ModelBackend::Stub => ModelProvider::new(StubModelFetcher),
        };

        let speakers = match (&settings.speaker.embedding_path, settings.models.backend) {
            (Some(path), _) => SpeakerEmbeddingProvider::new(NpyFileSpeakerFetcher::new(path)),
            (None, ModelBackend::Stub) => {
                SpeakerEmbeddingProvider::new(FixedSpeakerFetcher::zeros())
            }
            (None, ModelBackend::Speecht5) => {
                SpeakerEmbeddingProvider::new(DatasetSpeakerFetcher::new(
                    settings.speaker.clone(),
                    settings.models.cache_dir.clone(),
                ))
            }
        };

        let handler = SpeechRequestHandler::new(
            Arc::new(models),
            Arc::new(speakers),
            settings.output.dir.clone(),
        );
        Self::new(handler, settings.server.default_text.as_str())
    }
}
