//! Loaded model bundle
//!
//! Tokenizer, acoustic model and vocoder live together behind
//! [`SpeechSynthesizer`]; the bundle is built once by [`HubModelFetcher`] and
//! shared by every request.

use std::sync::Arc;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tts_demo_config::constants::models;
use tts_demo_config::{GenerationConfig, ModelConfig};
use tts_demo_core::{AudioBuffer, Error, ModelFetcher, Result, SpeakerEmbedding, SpeechSynthesizer};

use crate::generation::{generate_spectrogram, GenerationParams};
use crate::hub::HubClient;
use crate::inference_err;
use crate::models::{HifiGan, HifiGanConfig, SpeechT5, SpeechT5Config};
use crate::processor::TextProcessor;

/// Pick the compute device
///
/// Falls back to CPU when no GPU is usable.
pub fn select_device(use_gpu: bool) -> Device {
    if !use_gpu {
        return Device::Cpu;
    }
    match Device::cuda_if_available(0) {
        Ok(device) => device,
        Err(e) => {
            tracing::warn!(error = %e, "CUDA unavailable, using CPU");
            Device::Cpu
        }
    }
}

/// SpeechT5 + HiFi-GAN ready for inference
pub struct ModelBundle {
    processor: TextProcessor,
    model: SpeechT5,
    vocoder: HifiGan,
    device: Device,
    params: GenerationParams,
    seed: Option<u64>,
}

impl ModelBundle {
    pub fn new(
        processor: TextProcessor,
        model: SpeechT5,
        vocoder: HifiGan,
        device: Device,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            processor,
            model,
            vocoder,
            device,
            params: GenerationParams::from(generation),
            seed: generation.seed,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn run(&self, ids: &[u32], speaker: &SpeakerEmbedding) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let speaker = Tensor::from_slice(speaker.as_slice(), speaker.shape(), &self.device)?;
        let mut rng = self.rng();

        let generated =
            generate_spectrogram(&self.model, &input_ids, &speaker, &self.params, &mut rng)?;
        tracing::debug!(
            tokens = ids.len(),
            steps = generated.steps,
            stopped = generated.stopped,
            "Spectrogram generated"
        );

        self.vocoder
            .forward(&generated.spectrogram)?
            .squeeze(0)?
            .to_device(&Device::Cpu)?
            .to_vec1::<f32>()
    }
}

impl SpeechSynthesizer for ModelBundle {
    fn synthesize(&self, text: &str, speaker: &SpeakerEmbedding) -> Result<AudioBuffer> {
        let expected = self.speaker_dim();
        if speaker.dim() != expected {
            return Err(Error::inference(format!(
                "speaker embedding has {} values, model expects {}",
                speaker.dim(),
                expected
            )));
        }

        let ids = self.processor.encode(text)?;
        let samples = self.run(&ids, speaker).map_err(inference_err)?;
        if samples.is_empty() {
            return Err(Error::inference("vocoder produced no samples"));
        }
        Ok(AudioBuffer::new(samples, self.sample_rate()))
    }

    fn sample_rate(&self) -> u32 {
        self.vocoder.config().sampling_rate
    }

    fn speaker_dim(&self) -> usize {
        self.model.config().speaker_embedding_dim
    }
}

/// Downloads and assembles the bundle from the hub
pub struct HubModelFetcher {
    models: ModelConfig,
    generation: GenerationConfig,
}

impl HubModelFetcher {
    pub fn new(models: ModelConfig, generation: GenerationConfig) -> Self {
        Self { models, generation }
    }

    fn load(&self) -> Result<ModelBundle> {
        let device = select_device(self.models.use_gpu);
        let hub = HubClient::new(&self.models.revision, self.models.cache_dir.as_deref())?;

        let t5_config: SpeechT5Config = hub.model_config(&self.models.tts_model_id)?;
        let vocoder_config: HifiGanConfig = hub.model_config(&self.models.vocoder_id)?;

        let tokenizer_path = hub.model_file(&self.models.tokenizer_id, models::TOKENIZER_FILE)?;
        let processor = TextProcessor::from_file(tokenizer_path, t5_config.eos_token_id)?;

        let model = SpeechT5::load(&t5_config, hub.weights(&self.models.tts_model_id, &device)?)
            .map_err(|e| Error::fetch(format!("failed to load {}: {e}", self.models.tts_model_id)))?;
        let vocoder = HifiGan::load(&vocoder_config, hub.weights(&self.models.vocoder_id, &device)?)
            .map_err(|e| Error::fetch(format!("failed to load {}: {e}", self.models.vocoder_id)))?;

        Ok(ModelBundle::new(processor, model, vocoder, device, &self.generation))
    }
}

impl ModelFetcher for HubModelFetcher {
    fn fetch(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
        let start = std::time::Instant::now();
        let bundle = self.load()?;
        tracing::info!(
            model = %self.models.tts_model_id,
            vocoder = %self.models.vocoder_id,
            sample_rate = bundle.sample_rate(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model bundle loaded"
        );
        Ok(Arc::new(bundle))
    }

    fn describe(&self) -> String {
        format!(
            "{} + {} (tokenizer {}, revision {})",
            self.models.tts_model_id,
            self.models.vocoder_id,
            self.models.tokenizer_id,
            self.models.revision
        )
    }
}
