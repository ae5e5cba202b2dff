//! Speech synthesis pipeline
//!
//! Features:
//! - Native candle implementations of SpeechT5 and the HiFi-GAN vocoder
//! - Hub download of model weights, tokenizer and reference x-vectors
//! - Load-once providers for the model bundle and speaker embedding
//! - 16-bit mono WAV encoding
//! - Offline stub synthesizer for development and tests

pub mod bundle;
pub mod generation;
pub mod hub;
pub mod models;
pub mod processor;
pub mod provider;
pub mod speaker;
pub mod stub;
pub mod synthesis;
pub mod wav;

pub use bundle::{select_device, HubModelFetcher, ModelBundle};
pub use generation::{generate_spectrogram, GenerationParams};
pub use hub::HubClient;
pub use processor::TextProcessor;
pub use provider::{ModelProvider, SpeakerEmbeddingProvider};
pub use speaker::{DatasetSpeakerFetcher, FixedSpeakerFetcher, NpyFileSpeakerFetcher};
pub use stub::{StubModelFetcher, StubSynthesizer};
pub use synthesis::synthesize;
pub use wav::{encode_wav, write_wav};

use tts_demo_core::Error;

/// Wrap a candle failure as an inference error
pub(crate) fn inference_err(e: candle_core::Error) -> Error {
    Error::inference(e.to_string())
}
