//! Offline synthesizer
//!
//! Produces a quiet tone about 50 ms per character so the whole request path
//! can run without downloading models.

use std::f32::consts::PI;
use std::sync::Arc;

use tts_demo_config::constants::{audio, speaker};
use tts_demo_core::{AudioBuffer, ModelFetcher, Result, SpeakerEmbedding, SpeechSynthesizer};

const TONE_HZ: f32 = 220.0;
const TONE_AMPLITUDE: f32 = 0.1;

/// Tone generator standing in for the neural models
#[derive(Debug, Clone)]
pub struct StubSynthesizer {
    sample_rate: u32,
    speaker_dim: usize,
}

impl Default for StubSynthesizer {
    fn default() -> Self {
        Self::new(audio::SAMPLE_RATE)
    }
}

impl StubSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            speaker_dim: speaker::EMBEDDING_DIM,
        }
    }
}

impl SpeechSynthesizer for StubSynthesizer {
    fn synthesize(&self, text: &str, _speaker: &SpeakerEmbedding) -> Result<AudioBuffer> {
        let len = text.chars().count().max(1) * (self.sample_rate as usize / 20);
        let step = 2.0 * PI * TONE_HZ / self.sample_rate as f32;
        let samples = (0..len)
            .map(|i| TONE_AMPLITUDE * (step * i as f32).sin())
            .collect();
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn speaker_dim(&self) -> usize {
        self.speaker_dim
    }
}

/// Builds a [`StubSynthesizer`]
#[derive(Debug, Default)]
pub struct StubModelFetcher;

impl ModelFetcher for StubModelFetcher {
    fn fetch(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
        tracing::warn!("Using stub synthesizer - audio output will be a test tone");
        Ok(Arc::new(StubSynthesizer::default()))
    }

    fn describe(&self) -> String {
        "stub tone generator".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_scales_with_text() {
        let synth = StubSynthesizer::default();
        let speaker = SpeakerEmbedding::zeros(512);
        let audio = synth.synthesize("Hello", &speaker).unwrap();
        assert_eq!(audio.len(), 5 * 800);
        assert_eq!(audio.sample_rate, 16000);
        assert!(audio.peak() <= TONE_AMPLITUDE + f32::EPSILON);
        assert!(audio.peak() > 0.0);
    }

    #[test]
    fn test_fetcher_builds_stub() {
        let synth = StubModelFetcher.fetch().unwrap();
        assert_eq!(synth.sample_rate(), 16000);
        assert_eq!(synth.speaker_dim(), 512);
    }
}
