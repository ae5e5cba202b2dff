//! SpeechT5 text-to-speech model
//!
//! Architecture:
//! - Text encoder prenet: token embedding + scaled sinusoidal positions
//! - Encoder: post-norm transformer layers with relative position bias
//! - Speech decoder prenet: two ReLU layers with always-on dropout, scaled
//!   positions, speaker conditioning
//! - Decoder: post-norm transformer layers (self-attention + cross-attention)
//! - Postnet: `feat_out`/`prob_out` heads and a residual conv stack
//!
//! Weight names follow the `SpeechT5ForTextToSpeech` checkpoint layout.

use candle_core::{Module, ModuleT, Result, Tensor, D};
use candle_nn::{
    batch_norm, conv1d_no_bias, embedding, layer_norm, linear, BatchNorm, BatchNormConfig,
    Conv1d, Conv1dConfig, Embedding, LayerNorm, Linear, VarBuilder,
};
use rand::Rng;
use serde::Deserialize;

use super::attention::{Attention, KvCache};
use super::modules::{
    consistent_dropout, l2_normalize, FeedForward, RelativePositionalEncoding,
    ScaledPositionalEncoding,
};

/// Subset of `config.json` the inference path needs
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechT5Config {
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_layers_12")]
    pub encoder_layers: usize,
    #[serde(default = "default_heads")]
    pub encoder_attention_heads: usize,
    #[serde(default = "default_ffn_dim")]
    pub encoder_ffn_dim: usize,
    #[serde(default = "default_layers_6")]
    pub decoder_layers: usize,
    #[serde(default = "default_heads")]
    pub decoder_attention_heads: usize,
    #[serde(default = "default_ffn_dim")]
    pub decoder_ffn_dim: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_num_mel_bins")]
    pub num_mel_bins: usize,
    #[serde(default = "default_prenet_layers")]
    pub speech_decoder_prenet_layers: usize,
    #[serde(default = "default_prenet_units")]
    pub speech_decoder_prenet_units: usize,
    #[serde(default = "default_prenet_dropout")]
    pub speech_decoder_prenet_dropout: f64,
    #[serde(default = "default_speaker_embedding_dim")]
    pub speaker_embedding_dim: usize,
    #[serde(default = "default_postnet_layers")]
    pub speech_decoder_postnet_layers: usize,
    #[serde(default = "default_postnet_units")]
    pub speech_decoder_postnet_units: usize,
    #[serde(default = "default_postnet_kernel")]
    pub speech_decoder_postnet_kernel: usize,
    #[serde(default = "default_reduction_factor")]
    pub reduction_factor: usize,
    #[serde(default = "default_max_speech_positions")]
    pub max_speech_positions: usize,
    #[serde(default = "default_max_text_positions")]
    pub max_text_positions: usize,
    #[serde(default = "default_max_relative_position")]
    pub encoder_max_relative_position: usize,
    #[serde(default = "default_pad_token_id")]
    pub pad_token_id: u32,
    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: u32,
}

fn default_vocab_size() -> usize {
    81
}
fn default_hidden_size() -> usize {
    768
}
fn default_layers_12() -> usize {
    12
}
fn default_layers_6() -> usize {
    6
}
fn default_heads() -> usize {
    12
}
fn default_ffn_dim() -> usize {
    3072
}
fn default_layer_norm_eps() -> f64 {
    1e-5
}
fn default_num_mel_bins() -> usize {
    80
}
fn default_prenet_layers() -> usize {
    2
}
fn default_prenet_units() -> usize {
    256
}
fn default_prenet_dropout() -> f64 {
    0.5
}
fn default_speaker_embedding_dim() -> usize {
    512
}
fn default_postnet_layers() -> usize {
    5
}
fn default_postnet_units() -> usize {
    256
}
fn default_postnet_kernel() -> usize {
    5
}
fn default_reduction_factor() -> usize {
    2
}
fn default_max_speech_positions() -> usize {
    4000
}
fn default_max_text_positions() -> usize {
    450
}
fn default_max_relative_position() -> usize {
    160
}
fn default_pad_token_id() -> u32 {
    1
}
fn default_eos_token_id() -> u32 {
    2
}

impl Default for SpeechT5Config {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
            hidden_size: default_hidden_size(),
            encoder_layers: default_layers_12(),
            encoder_attention_heads: default_heads(),
            encoder_ffn_dim: default_ffn_dim(),
            decoder_layers: default_layers_6(),
            decoder_attention_heads: default_heads(),
            decoder_ffn_dim: default_ffn_dim(),
            layer_norm_eps: default_layer_norm_eps(),
            num_mel_bins: default_num_mel_bins(),
            speech_decoder_prenet_layers: default_prenet_layers(),
            speech_decoder_prenet_units: default_prenet_units(),
            speech_decoder_prenet_dropout: default_prenet_dropout(),
            speaker_embedding_dim: default_speaker_embedding_dim(),
            speech_decoder_postnet_layers: default_postnet_layers(),
            speech_decoder_postnet_units: default_postnet_units(),
            speech_decoder_postnet_kernel: default_postnet_kernel(),
            reduction_factor: default_reduction_factor(),
            max_speech_positions: default_max_speech_positions(),
            max_text_positions: default_max_text_positions(),
            encoder_max_relative_position: default_max_relative_position(),
            pad_token_id: default_pad_token_id(),
            eos_token_id: default_eos_token_id(),
        }
    }
}

// ============================================================================
// Encoder
// ============================================================================

struct EncoderLayer {
    attention: Attention,
    layer_norm: LayerNorm,
    feed_forward: FeedForward,
    final_layer_norm: LayerNorm,
}

impl EncoderLayer {
    fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let dim = cfg.hidden_size;
        Ok(Self {
            attention: Attention::new(dim, cfg.encoder_attention_heads, vb.pp("attention"))?,
            layer_norm: layer_norm(dim, cfg.layer_norm_eps, vb.pp("layer_norm"))?,
            feed_forward: FeedForward::new(dim, cfg.encoder_ffn_dim, vb.pp("feed_forward"))?,
            final_layer_norm: layer_norm(dim, cfg.layer_norm_eps, vb.pp("final_layer_norm"))?,
        })
    }

    fn forward(&self, x: &Tensor, position_bias: &Tensor) -> Result<Tensor> {
        let h = self.attention.forward_self(x, Some(position_bias))?;
        let x = self.layer_norm.forward(&(x + h)?)?;
        let h = self.feed_forward.forward(&x)?;
        self.final_layer_norm.forward(&(x + h)?)
    }
}

/// Text prenet + transformer encoder
pub struct TextEncoder {
    embed_tokens: Embedding,
    encode_positions: ScaledPositionalEncoding,
    layer_norm: LayerNorm,
    embed_positions: RelativePositionalEncoding,
    layers: Vec<EncoderLayer>,
}

impl TextEncoder {
    /// `vb` points at `speecht5.encoder`
    pub fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let prenet = vb.pp("prenet");
        let wrapped = vb.pp("wrapped_encoder");
        let head_dim = cfg.hidden_size / cfg.encoder_attention_heads;

        let layers = (0..cfg.encoder_layers)
            .map(|i| EncoderLayer::new(cfg, wrapped.pp(format!("layers.{}", i))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embed_tokens: embedding(cfg.vocab_size, cfg.hidden_size, prenet.pp("embed_tokens"))?,
            encode_positions: ScaledPositionalEncoding::new(
                cfg.hidden_size,
                cfg.max_text_positions,
                prenet.pp("encode_positions"),
            )?,
            layer_norm: layer_norm(cfg.hidden_size, cfg.layer_norm_eps, wrapped.pp("layer_norm"))?,
            embed_positions: RelativePositionalEncoding::new(
                head_dim,
                cfg.encoder_max_relative_position,
                wrapped.pp("embed_positions"),
            )?,
            layers,
        })
    }

    /// `input_ids: (1, len)` -> `(1, len, hidden)`
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let x = self.embed_tokens.forward(input_ids)?;
        let x = self.encode_positions.forward(&x, 0)?;
        let mut x = self.layer_norm.forward(&x)?;
        let position_bias = self.embed_positions.forward(x.dim(1)?, x.device())?;
        for layer in &self.layers {
            x = layer.forward(&x, &position_bias)?;
        }
        Ok(x)
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Previous mel frame -> decoder input, conditioned on the speaker
pub struct SpeechDecoderPrenet {
    layers: Vec<Linear>,
    final_layer: Linear,
    encode_positions: ScaledPositionalEncoding,
    speaker_embeds_layer: Linear,
    dropout: f64,
}

impl SpeechDecoderPrenet {
    fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let units = cfg.speech_decoder_prenet_units;
        let layers = (0..cfg.speech_decoder_prenet_layers)
            .map(|i| {
                let in_dim = if i == 0 { cfg.num_mel_bins } else { units };
                linear(in_dim, units, vb.pp(format!("layers.{}", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            layers,
            final_layer: linear(units, cfg.hidden_size, vb.pp("final_layer"))?,
            encode_positions: ScaledPositionalEncoding::new(
                cfg.hidden_size,
                cfg.max_speech_positions,
                vb.pp("encode_positions"),
            )?,
            speaker_embeds_layer: linear(
                cfg.speaker_embedding_dim + cfg.hidden_size,
                cfg.hidden_size,
                vb.pp("speaker_embeds_layer"),
            )?,
            dropout: cfg.speech_decoder_prenet_dropout,
        })
    }

    /// `frames: (1, len, mel)` at positions `offset..`; `speaker: (1, dim)`
    pub fn forward<R: Rng + ?Sized>(
        &self,
        frames: &Tensor,
        offset: usize,
        speaker: &Tensor,
        rng: &mut R,
    ) -> Result<Tensor> {
        let mut x = frames.clone();
        for layer in &self.layers {
            x = layer.forward(&x)?.relu()?;
            x = consistent_dropout(&x, self.dropout, rng)?;
        }
        let x = self.final_layer.forward(&x)?;
        let x = self.encode_positions.forward(&x, offset)?;

        let (b, len, _) = x.dims3()?;
        let speaker = l2_normalize(speaker)?;
        let speaker_dim = speaker.dim(D::Minus1)?;
        let speaker = speaker.unsqueeze(1)?.broadcast_as((b, len, speaker_dim))?;
        let x = Tensor::cat(&[&x, &speaker.contiguous()?], D::Minus1)?;
        self.speaker_embeds_layer.forward(&x)?.relu()
    }
}

struct DecoderLayer {
    self_attn: Attention,
    self_attn_layer_norm: LayerNorm,
    encoder_attn: Attention,
    encoder_attn_layer_norm: LayerNorm,
    feed_forward: FeedForward,
    final_layer_norm: LayerNorm,
}

impl DecoderLayer {
    fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let dim = cfg.hidden_size;
        let eps = cfg.layer_norm_eps;
        Ok(Self {
            self_attn: Attention::new(dim, cfg.decoder_attention_heads, vb.pp("self_attn"))?,
            self_attn_layer_norm: layer_norm(dim, eps, vb.pp("self_attn_layer_norm"))?,
            encoder_attn: Attention::new(dim, cfg.decoder_attention_heads, vb.pp("encoder_attn"))?,
            encoder_attn_layer_norm: layer_norm(dim, eps, vb.pp("encoder_attn_layer_norm"))?,
            feed_forward: FeedForward::new(dim, cfg.decoder_ffn_dim, vb.pp("feed_forward"))?,
            final_layer_norm: layer_norm(dim, eps, vb.pp("final_layer_norm"))?,
        })
    }

    fn forward(&self, x: &Tensor, cross: &KvCache, cache: &mut Option<KvCache>) -> Result<Tensor> {
        let h = self.self_attn.forward_cached(x, cache)?;
        let x = self.self_attn_layer_norm.forward(&(x + h)?)?;
        let h = self.encoder_attn.attend(&x, cross, None)?;
        let x = self.encoder_attn_layer_norm.forward(&(x + h)?)?;
        let h = self.feed_forward.forward(&x)?;
        self.final_layer_norm.forward(&(x + h)?)
    }
}

/// Per-utterance decoding state
pub struct DecoderState {
    cross: Vec<KvCache>,
    self_attn: Vec<Option<KvCache>>,
    /// Number of decoder steps taken so far
    pub position: usize,
}

/// Speech prenet + transformer decoder
pub struct SpeechDecoder {
    pub prenet: SpeechDecoderPrenet,
    layers: Vec<DecoderLayer>,
}

impl SpeechDecoder {
    /// `vb` points at `speecht5.decoder`
    pub fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let wrapped = vb.pp("wrapped_decoder");
        let layers = (0..cfg.decoder_layers)
            .map(|i| DecoderLayer::new(cfg, wrapped.pp(format!("layers.{}", i))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            prenet: SpeechDecoderPrenet::new(cfg, vb.pp("prenet"))?,
            layers,
        })
    }

    /// Project the encoder output once for every cross-attention layer
    pub fn start(&self, encoder_out: &Tensor) -> Result<DecoderState> {
        let cross = self
            .layers
            .iter()
            .map(|layer| layer.encoder_attn.project_kv(encoder_out))
            .collect::<Result<Vec<_>>>()?;
        Ok(DecoderState {
            cross,
            self_attn: vec![None; self.layers.len()],
            position: 0,
        })
    }

    /// Decode one step from the previous frame `(1, 1, mel)`; returns `(1, hidden)`
    pub fn step<R: Rng + ?Sized>(
        &self,
        prev_frame: &Tensor,
        speaker: &Tensor,
        state: &mut DecoderState,
        rng: &mut R,
    ) -> Result<Tensor> {
        let mut x = self
            .prenet
            .forward(prev_frame, state.position, speaker, rng)?;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, &state.cross[i], &mut state.self_attn[i])?;
        }
        state.position += 1;
        x.squeeze(1)
    }
}

// ============================================================================
// Postnet
// ============================================================================

struct BatchNormConvLayer {
    conv: Conv1d,
    batch_norm: BatchNorm,
    tanh: bool,
}

impl BatchNormConvLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv.forward(x)?;
        let x = self.batch_norm.forward_t(&x, false)?;
        if self.tanh {
            x.tanh()
        } else {
            Ok(x)
        }
    }
}

/// Output heads and residual spectrogram refinement
pub struct SpeechDecoderPostnet {
    feat_out: Linear,
    prob_out: Linear,
    layers: Vec<BatchNormConvLayer>,
    num_mel_bins: usize,
    reduction_factor: usize,
}

impl SpeechDecoderPostnet {
    /// `vb` points at `speech_decoder_postnet`
    pub fn new(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        let n = cfg.speech_decoder_postnet_layers;
        let units = cfg.speech_decoder_postnet_units;
        let kernel = cfg.speech_decoder_postnet_kernel;
        let conv_cfg = Conv1dConfig {
            padding: (kernel - 1) / 2,
            ..Default::default()
        };

        let layers = (0..n)
            .map(|i| {
                let in_dim = if i == 0 { cfg.num_mel_bins } else { units };
                let out_dim = if i == n - 1 { cfg.num_mel_bins } else { units };
                let lvb = vb.pp(format!("layers.{}", i));
                Ok(BatchNormConvLayer {
                    conv: conv1d_no_bias(in_dim, out_dim, kernel, conv_cfg, lvb.pp("conv"))?,
                    batch_norm: batch_norm(out_dim, BatchNormConfig::default(), lvb.pp("batch_norm"))?,
                    tanh: i < n - 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            feat_out: linear(
                cfg.hidden_size,
                cfg.num_mel_bins * cfg.reduction_factor,
                vb.pp("feat_out"),
            )?,
            prob_out: linear(cfg.hidden_size, cfg.reduction_factor, vb.pp("prob_out"))?,
            layers,
            num_mel_bins: cfg.num_mel_bins,
            reduction_factor: cfg.reduction_factor,
        })
    }

    /// `(1, hidden)` -> `(1, reduction_factor, mel)`
    pub fn frames(&self, hidden: &Tensor) -> Result<Tensor> {
        let b = hidden.dim(0)?;
        self.feat_out
            .forward(hidden)?
            .reshape((b, self.reduction_factor, self.num_mel_bins))
    }

    /// Stop probabilities `(1, reduction_factor)`
    pub fn stop_probs(&self, hidden: &Tensor) -> Result<Tensor> {
        candle_nn::ops::sigmoid(&self.prob_out.forward(hidden)?)
    }

    /// `(1, len, mel)` -> refined `(1, len, mel)`
    pub fn refine(&self, spectrogram: &Tensor) -> Result<Tensor> {
        let mut x = spectrogram.transpose(1, 2)?.contiguous()?;
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }
        spectrogram + x.transpose(1, 2)?
    }
}

// ============================================================================
// Model
// ============================================================================

/// `SpeechT5ForTextToSpeech` without the training-only heads
pub struct SpeechT5 {
    pub encoder: TextEncoder,
    pub decoder: SpeechDecoder,
    pub postnet: SpeechDecoderPostnet,
    config: SpeechT5Config,
}

impl SpeechT5 {
    pub fn load(cfg: &SpeechT5Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            encoder: TextEncoder::new(cfg, vb.pp("speecht5.encoder"))?,
            decoder: SpeechDecoder::new(cfg, vb.pp("speecht5.decoder"))?,
            postnet: SpeechDecoderPostnet::new(cfg, vb.pp("speech_decoder_postnet"))?,
            config: cfg.clone(),
        })
    }

    pub fn config(&self) -> &SpeechT5Config {
        &self.config
    }
}
