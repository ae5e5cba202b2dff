//! HiFi-GAN vocoder (SpeechT5 variant)
//!
//! Mel spectrogram `(1, frames, mel)` -> waveform `(1, frames * prod(upsample_rates))`.
//!
//! Architecture:
//! - input normalisation with the stored `mean`/`scale`
//! - `conv_pre` (kernel 7)
//! - per stage: leaky ReLU, transposed-conv upsampler, average of
//!   multi-receptive-field residual blocks
//! - leaky ReLU (slope 0.01), `conv_post`, tanh

use candle_core::{Module, Result, Tensor};
use candle_nn::{
    conv1d, conv_transpose1d, Conv1d, Conv1dConfig, ConvTranspose1d, ConvTranspose1dConfig,
    VarBuilder,
};
use serde::Deserialize;

use super::modules::leaky_relu;

/// Slope of the activation before `conv_post` (PyTorch default)
const FINAL_LEAKY_RELU_SLOPE: f64 = 0.01;

#[derive(Debug, Clone, Deserialize)]
pub struct HifiGanConfig {
    #[serde(default = "default_model_in_dim")]
    pub model_in_dim: usize,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    #[serde(default = "default_upsample_initial_channel")]
    pub upsample_initial_channel: usize,
    #[serde(default = "default_upsample_rates")]
    pub upsample_rates: Vec<usize>,
    #[serde(default = "default_upsample_kernel_sizes")]
    pub upsample_kernel_sizes: Vec<usize>,
    #[serde(default = "default_resblock_kernel_sizes")]
    pub resblock_kernel_sizes: Vec<usize>,
    #[serde(default = "default_resblock_dilation_sizes")]
    pub resblock_dilation_sizes: Vec<Vec<usize>>,
    #[serde(default = "default_leaky_relu_slope")]
    pub leaky_relu_slope: f64,
    #[serde(default = "default_normalize_before")]
    pub normalize_before: bool,
}

fn default_model_in_dim() -> usize {
    80
}
fn default_sampling_rate() -> u32 {
    16000
}
fn default_upsample_initial_channel() -> usize {
    512
}
fn default_upsample_rates() -> Vec<usize> {
    vec![4, 4, 4, 4]
}
fn default_upsample_kernel_sizes() -> Vec<usize> {
    vec![8, 8, 8, 8]
}
fn default_resblock_kernel_sizes() -> Vec<usize> {
    vec![3, 7, 11]
}
fn default_resblock_dilation_sizes() -> Vec<Vec<usize>> {
    vec![vec![1, 3, 5], vec![1, 3, 5], vec![1, 3, 5]]
}
fn default_leaky_relu_slope() -> f64 {
    0.1
}
fn default_normalize_before() -> bool {
    true
}

impl Default for HifiGanConfig {
    fn default() -> Self {
        Self {
            model_in_dim: default_model_in_dim(),
            sampling_rate: default_sampling_rate(),
            upsample_initial_channel: default_upsample_initial_channel(),
            upsample_rates: default_upsample_rates(),
            upsample_kernel_sizes: default_upsample_kernel_sizes(),
            resblock_kernel_sizes: default_resblock_kernel_sizes(),
            resblock_dilation_sizes: default_resblock_dilation_sizes(),
            leaky_relu_slope: default_leaky_relu_slope(),
            normalize_before: default_normalize_before(),
        }
    }
}

impl HifiGanConfig {
    /// Output samples per input frame
    pub fn hop_length(&self) -> usize {
        self.upsample_rates.iter().product()
    }
}

/// Same-length padding for a dilated kernel
fn same_padding(kernel: usize, dilation: usize) -> usize {
    (kernel * dilation - dilation) / 2
}

struct ResidualBlock {
    convs1: Vec<Conv1d>,
    convs2: Vec<Conv1d>,
    slope: f64,
}

impl ResidualBlock {
    fn new(
        channels: usize,
        kernel: usize,
        dilations: &[usize],
        slope: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut convs1 = Vec::with_capacity(dilations.len());
        let mut convs2 = Vec::with_capacity(dilations.len());
        for (i, &dilation) in dilations.iter().enumerate() {
            let cfg1 = Conv1dConfig {
                padding: same_padding(kernel, dilation),
                dilation,
                ..Default::default()
            };
            let cfg2 = Conv1dConfig {
                padding: same_padding(kernel, 1),
                ..Default::default()
            };
            convs1.push(conv1d(channels, channels, kernel, cfg1, vb.pp(format!("convs1.{}", i)))?);
            convs2.push(conv1d(channels, channels, kernel, cfg2, vb.pp(format!("convs2.{}", i)))?);
        }
        Ok(Self {
            convs1,
            convs2,
            slope,
        })
    }
}

impl Module for ResidualBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut x = x.clone();
        for (conv1, conv2) in self.convs1.iter().zip(&self.convs2) {
            let h = conv1.forward(&leaky_relu(&x, self.slope)?)?;
            let h = conv2.forward(&leaky_relu(&h, self.slope)?)?;
            x = (h + x)?;
        }
        Ok(x)
    }
}

pub struct HifiGan {
    mean: Tensor,
    scale: Tensor,
    conv_pre: Conv1d,
    upsamplers: Vec<ConvTranspose1d>,
    resblocks: Vec<ResidualBlock>,
    conv_post: Conv1d,
    config: HifiGanConfig,
}

impl HifiGan {
    pub fn load(cfg: &HifiGanConfig, vb: VarBuilder) -> Result<Self> {
        if cfg.upsample_rates.len() != cfg.upsample_kernel_sizes.len() {
            candle_core::bail!(
                "{} upsample rates but {} kernel sizes",
                cfg.upsample_rates.len(),
                cfg.upsample_kernel_sizes.len()
            );
        }
        if cfg.resblock_kernel_sizes.len() != cfg.resblock_dilation_sizes.len() {
            candle_core::bail!("resblock kernel and dilation lists differ in length");
        }

        let mean = vb.get(cfg.model_in_dim, "mean")?;
        let scale = vb.get(cfg.model_in_dim, "scale")?;

        let conv_pre = conv1d(
            cfg.model_in_dim,
            cfg.upsample_initial_channel,
            7,
            Conv1dConfig {
                padding: 3,
                ..Default::default()
            },
            vb.pp("conv_pre"),
        )?;

        let mut upsamplers = Vec::with_capacity(cfg.upsample_rates.len());
        let mut resblocks = Vec::new();
        let mut channels = cfg.upsample_initial_channel;
        for (i, (&rate, &kernel)) in cfg
            .upsample_rates
            .iter()
            .zip(&cfg.upsample_kernel_sizes)
            .enumerate()
        {
            let out_channels = cfg.upsample_initial_channel / 2usize.pow(i as u32 + 1);
            let up_cfg = ConvTranspose1dConfig {
                padding: (kernel - rate) / 2,
                stride: rate,
                ..Default::default()
            };
            upsamplers.push(conv_transpose1d(
                channels,
                out_channels,
                kernel,
                up_cfg,
                vb.pp(format!("upsampler.{}", i)),
            )?);
            channels = out_channels;

            for (kernel, dilations) in cfg
                .resblock_kernel_sizes
                .iter()
                .zip(&cfg.resblock_dilation_sizes)
            {
                let idx = resblocks.len();
                resblocks.push(ResidualBlock::new(
                    channels,
                    *kernel,
                    dilations,
                    cfg.leaky_relu_slope,
                    vb.pp(format!("resblocks.{}", idx)),
                )?);
            }
        }

        let conv_post = conv1d(
            channels,
            1,
            7,
            Conv1dConfig {
                padding: 3,
                ..Default::default()
            },
            vb.pp("conv_post"),
        )?;

        Ok(Self {
            mean,
            scale,
            conv_pre,
            upsamplers,
            resblocks,
            conv_post,
            config: cfg.clone(),
        })
    }

    pub fn config(&self) -> &HifiGanConfig {
        &self.config
    }

    /// `(1, frames, mel)` -> `(1, samples)`
    pub fn forward(&self, spectrogram: &Tensor) -> Result<Tensor> {
        let x = if self.config.normalize_before {
            spectrogram
                .broadcast_sub(&self.mean)?
                .broadcast_div(&self.scale)?
        } else {
            spectrogram.clone()
        };

        let mut x = self.conv_pre.forward(&x.transpose(1, 2)?.contiguous()?)?;
        let kernels = self.config.resblock_kernel_sizes.len();
        for (i, upsampler) in self.upsamplers.iter().enumerate() {
            x = upsampler.forward(&leaky_relu(&x, self.config.leaky_relu_slope)?)?;
            let blocks = &self.resblocks[i * kernels..(i + 1) * kernels];
            let mut acc = blocks[0].forward(&x)?;
            for block in &blocks[1..] {
                acc = (acc + block.forward(&x)?)?;
            }
            x = (acc / kernels as f64)?;
        }
        let x = leaky_relu(&x, FINAL_LEAKY_RELU_SLOPE)?;
        let x = self.conv_post.forward(&x)?.tanh()?;
        x.squeeze(1)
    }
}
