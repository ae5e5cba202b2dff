//! Seams between request handling and inference
//!
//! The model bundle and the speaker embedding are each built by a fetcher.
//! Providers call a fetcher at most once and cache what it returns.

use std::sync::Arc;

use crate::{AudioBuffer, Result, SpeakerEmbedding};

/// Turns text into a waveform
///
/// Implementations are immutable once built and shared across requests.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in the voice described by `speaker`
    fn synthesize(&self, text: &str, speaker: &SpeakerEmbedding) -> Result<AudioBuffer>;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Expected speaker embedding dimension
    fn speaker_dim(&self) -> usize;
}

/// Builds the model bundle from an external source
pub trait ModelFetcher: Send + Sync {
    fn fetch(&self) -> Result<Arc<dyn SpeechSynthesizer>>;

    /// Human-readable source description for logs
    fn describe(&self) -> String;
}

/// Loads the reference speaker embedding from an external source
pub trait SpeakerFetcher: Send + Sync {
    fn fetch(&self) -> Result<SpeakerEmbedding>;

    fn describe(&self) -> String;
}
