//! Text to waveform with output checks

use tts_demo_config::constants::audio;
use tts_demo_core::{AudioBuffer, Error, Result, SpeakerEmbedding, SpeechSynthesizer};

/// Run `synthesizer` on `text`
///
/// The result is guaranteed non-empty and at the output sample rate.
pub fn synthesize(
    text: &str,
    synthesizer: &dyn SpeechSynthesizer,
    speaker: &SpeakerEmbedding,
) -> Result<AudioBuffer> {
    if text.trim().is_empty() {
        return Err(Error::EmptyInput);
    }

    let start = std::time::Instant::now();
    let buffer = synthesizer.synthesize(text, speaker)?;
    if buffer.is_empty() {
        return Err(Error::inference("synthesis produced no audio"));
    }
    if buffer.sample_rate != audio::SAMPLE_RATE {
        return Err(Error::inference(format!(
            "unexpected sample rate {} Hz, expected {} Hz",
            buffer.sample_rate,
            audio::SAMPLE_RATE
        )));
    }

    tracing::debug!(
        chars = text.chars().count(),
        samples = buffer.len(),
        audio_secs = buffer.duration_secs(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Synthesis complete"
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSynthesizer;

    struct SilentSynthesizer;

    impl SpeechSynthesizer for SilentSynthesizer {
        fn synthesize(&self, _text: &str, _speaker: &SpeakerEmbedding) -> Result<AudioBuffer> {
            Ok(AudioBuffer::new(Vec::new(), 16000))
        }

        fn sample_rate(&self) -> u32 {
            16000
        }

        fn speaker_dim(&self) -> usize {
            512
        }
    }

    #[test]
    fn test_stub_output_passes_checks() {
        let speaker = SpeakerEmbedding::zeros(512);
        let audio = synthesize("Hello, my dog is cute.", &StubSynthesizer::default(), &speaker)
            .unwrap();
        assert!(!audio.is_empty());
        assert_eq!(audio.sample_rate, 16000);
    }

    #[test]
    fn test_empty_output_is_inference_error() {
        let speaker = SpeakerEmbedding::zeros(512);
        let err = synthesize("hi", &SilentSynthesizer, &speaker).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_wrong_sample_rate_rejected() {
        let speaker = SpeakerEmbedding::zeros(512);
        let err = synthesize("hi", &StubSynthesizer::new(22050), &speaker).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_blank_text_rejected() {
        let speaker = SpeakerEmbedding::zeros(512);
        let err = synthesize("  \n", &StubSynthesizer::default(), &speaker).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }
}
