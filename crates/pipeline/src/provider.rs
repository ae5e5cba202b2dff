//! Load-once providers
//!
//! Each provider wraps a fetcher and caches the first successful result for
//! the life of the process. Concurrent first callers block on the same
//! initialization; a failed fetch is not cached and the next call retries.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tts_demo_core::{ModelFetcher, Result, SpeakerEmbedding, SpeakerFetcher, SpeechSynthesizer};

/// Shared model bundle
pub struct ModelProvider {
    fetcher: Box<dyn ModelFetcher>,
    bundle: OnceCell<Arc<dyn SpeechSynthesizer>>,
}

impl ModelProvider {
    pub fn new(fetcher: impl ModelFetcher + 'static) -> Self {
        Self::from_boxed(Box::new(fetcher))
    }

    pub fn from_boxed(fetcher: Box<dyn ModelFetcher>) -> Self {
        Self {
            fetcher,
            bundle: OnceCell::new(),
        }
    }

    /// The bundle, fetching it on first use
    pub fn get(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
        self.bundle
            .get_or_try_init(|| {
                tracing::info!(source = %self.fetcher.describe(), "Loading models");
                self.fetcher.fetch().map_err(|e| {
                    tracing::error!(error = %e, "Model load failed");
                    e
                })
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.get().is_some()
    }
}

/// Shared reference speaker embedding
pub struct SpeakerEmbeddingProvider {
    fetcher: Box<dyn SpeakerFetcher>,
    embedding: OnceCell<Arc<SpeakerEmbedding>>,
}

impl SpeakerEmbeddingProvider {
    pub fn new(fetcher: impl SpeakerFetcher + 'static) -> Self {
        Self::from_boxed(Box::new(fetcher))
    }

    pub fn from_boxed(fetcher: Box<dyn SpeakerFetcher>) -> Self {
        Self {
            fetcher,
            embedding: OnceCell::new(),
        }
    }

    /// The embedding, fetching it on first use
    pub fn get(&self) -> Result<Arc<SpeakerEmbedding>> {
        self.embedding
            .get_or_try_init(|| {
                tracing::info!(source = %self.fetcher.describe(), "Loading speaker embedding");
                self.fetcher.fetch().map(Arc::new).map_err(|e| {
                    tracing::error!(error = %e, "Speaker embedding load failed");
                    e
                })
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.embedding.get().is_some()
    }
}
