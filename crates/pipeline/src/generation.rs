//! Autoregressive spectrogram generation
//!
//! Each decoder step emits `reduction_factor` mel frames plus stop
//! probabilities. Decoding ends once the summed probability reaches the
//! threshold (after `minlen` steps) or at `maxlen` steps.

use candle_core::{Result, Tensor};
use rand::Rng;
use tts_demo_config::GenerationConfig;

use crate::models::speecht5::SpeechT5;
use crate::models::modules::zeros_frames;

/// Decoding limits and stop criterion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub threshold: f64,
    pub minlenratio: f64,
    pub maxlenratio: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(cfg: &GenerationConfig) -> Self {
        Self {
            threshold: cfg.threshold,
            minlenratio: cfg.minlenratio,
            maxlenratio: cfg.maxlenratio,
        }
    }
}

impl GenerationParams {
    /// `(minlen, maxlen)` in decoder steps for an encoder output of `enc_len`
    pub fn step_limits(&self, enc_len: usize, reduction_factor: usize) -> (usize, usize) {
        let rf = reduction_factor.max(1) as f64;
        let minlen = (enc_len as f64 * self.minlenratio / rf) as usize;
        let maxlen = (enc_len as f64 * self.maxlenratio / rf) as usize;
        (minlen, maxlen)
    }
}

/// Spectrogram produced for one utterance
pub struct GeneratedSpectrogram {
    /// Postnet-refined `(1, frames, mel)`
    pub spectrogram: Tensor,
    /// Decoder steps taken
    pub steps: usize,
    /// Whether decoding ended on the stop probability rather than `maxlen`
    pub stopped: bool,
}

/// Run the encoder and the decoding loop
///
/// `input_ids: (1, len)`, `speaker: (1, speaker_dim)`
pub fn generate_spectrogram<R: Rng + ?Sized>(
    model: &SpeechT5,
    input_ids: &Tensor,
    speaker: &Tensor,
    params: &GenerationParams,
    rng: &mut R,
) -> Result<GeneratedSpectrogram> {
    let cfg = model.config();
    let encoder_out = model.encoder.forward(input_ids)?;
    let (minlen, maxlen) = params.step_limits(encoder_out.dim(1)?, cfg.reduction_factor);

    let mut state = model.decoder.start(&encoder_out)?;
    let mut prev_frame = zeros_frames(1, 1, cfg.num_mel_bins, encoder_out.device())?
        .to_dtype(encoder_out.dtype())?;
    let mut chunks = Vec::new();
    let mut steps = 0usize;
    let stopped = loop {
        steps += 1;
        let hidden = model.decoder.step(&prev_frame, speaker, &mut state, rng)?;

        let frames = model.postnet.frames(&hidden)?;
        prev_frame = frames.narrow(1, cfg.reduction_factor - 1, 1)?.contiguous()?;
        chunks.push(frames);

        if steps < minlen {
            continue;
        }
        let prob: f32 = model
            .postnet
            .stop_probs(&hidden)?
            .sum_all()?
            .to_dtype(candle_core::DType::F32)?
            .to_scalar()?;
        if prob as f64 >= params.threshold {
            break true;
        }
        if steps >= maxlen {
            break false;
        }
    };

    tracing::debug!(steps, minlen, maxlen, stopped, "Decoding finished");

    let spectrogram = Tensor::cat(&chunks, 1)?;
    let spectrogram = model.postnet.refine(&spectrogram)?;
    Ok(GeneratedSpectrogram {
        spectrogram,
        steps,
        stopped,
    })
}
