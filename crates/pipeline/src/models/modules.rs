//! Building blocks shared by the SpeechT5 encoder and decoder
//!
//! - sinusoidal positional encoding with a learned scale (`alpha`)
//! - relative position embeddings for encoder self-attention
//! - GELU feed-forward block
//! - prenet dropout that stays active at inference time

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{embedding, linear, Embedding, Linear, VarBuilder};
use rand::Rng;

/// Sinusoidal table `(max_len, dim)`: sin on even columns, cos on odd ones
pub fn sinusoid_table(max_len: usize, dim: usize, device: &Device) -> Result<Tensor> {
    let mut table = vec![0.0f32; max_len * dim];
    let scale = -(10000f64.ln()) / dim as f64;
    for pos in 0..max_len {
        for i in (0..dim).step_by(2) {
            let angle = pos as f64 * (i as f64 * scale).exp();
            table[pos * dim + i] = angle.sin() as f32;
            if i + 1 < dim {
                table[pos * dim + i + 1] = angle.cos() as f32;
            }
        }
    }
    Tensor::from_vec(table, (max_len, dim), device)
}

/// `x + alpha * pe[offset..offset + len]`
///
/// The table is not part of the checkpoint; only `alpha` is.
pub struct ScaledPositionalEncoding {
    table: Tensor,
    alpha: Tensor,
    max_len: usize,
}

impl ScaledPositionalEncoding {
    pub fn new(dim: usize, max_len: usize, vb: VarBuilder) -> Result<Self> {
        let alpha = vb.get((), "alpha")?;
        let table = sinusoid_table(max_len, dim, vb.device())?.to_dtype(vb.dtype())?;
        Ok(Self {
            table,
            alpha,
            max_len,
        })
    }

    /// Add encodings for positions `offset..offset + seq_len` to `x: (batch, seq_len, dim)`
    pub fn forward(&self, x: &Tensor, offset: usize) -> Result<Tensor> {
        let seq_len = x.dim(1)?;
        if offset + seq_len > self.max_len {
            candle_core::bail!(
                "position {} exceeds positional table of {} entries",
                offset + seq_len,
                self.max_len
            );
        }
        let pe = self.table.narrow(0, offset, seq_len)?.unsqueeze(0)?;
        let pe = pe.broadcast_mul(&self.alpha)?;
        x.broadcast_add(&pe)
    }
}

/// Clipped relative distances mapped to learned key embeddings
pub struct RelativePositionalEncoding {
    pe_k: Embedding,
    max_length: usize,
}

impl RelativePositionalEncoding {
    pub fn new(head_dim: usize, max_length: usize, vb: VarBuilder) -> Result<Self> {
        let pe_k = embedding(2 * max_length, head_dim, vb.pp("pe_k"))?;
        Ok(Self { pe_k, max_length })
    }

    /// Position bias `(seq_len, seq_len, head_dim)`
    pub fn forward(&self, seq_len: usize, device: &Device) -> Result<Tensor> {
        let ids = relative_position_ids(seq_len, self.max_length);
        let ids = Tensor::from_vec(ids, (seq_len, seq_len), device)?;
        self.pe_k.forward(&ids)
    }
}

/// `clamp(i - j, -max, max - 1) + max` for every query `i` and key `j`
pub fn relative_position_ids(seq_len: usize, max_length: usize) -> Vec<u32> {
    let max = max_length as i64;
    let mut ids = Vec::with_capacity(seq_len * seq_len);
    for i in 0..seq_len as i64 {
        for j in 0..seq_len as i64 {
            let rel = (i - j).clamp(-max, max - 1);
            ids.push((rel + max) as u32);
        }
    }
    ids
}

/// Linear -> GELU -> Linear
pub struct FeedForward {
    intermediate_dense: Linear,
    output_dense: Linear,
}

impl FeedForward {
    pub fn new(dim: usize, ffn_dim: usize, vb: VarBuilder) -> Result<Self> {
        let intermediate_dense = linear(dim, ffn_dim, vb.pp("intermediate_dense"))?;
        let output_dense = linear(ffn_dim, dim, vb.pp("output_dense"))?;
        Ok(Self {
            intermediate_dense,
            output_dense,
        })
    }
}

impl Module for FeedForward {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.intermediate_dense.forward(x)?.gelu_erf()?;
        self.output_dense.forward(&x)
    }
}

/// Dropout that is applied at inference time.
///
/// The decoder prenet relies on it for output variety; one mask is drawn per
/// call and shared across the batch.
pub fn consistent_dropout<R: Rng + ?Sized>(x: &Tensor, p: f64, rng: &mut R) -> Result<Tensor> {
    if p <= 0.0 {
        return Ok(x.clone());
    }
    if p >= 1.0 {
        return x.zeros_like();
    }
    let dims = x.dims();
    let rest = match dims.split_first() {
        Some((_, rest)) => rest.to_vec(),
        None => candle_core::bail!("dropout input must have a batch dimension"),
    };
    let count: usize = rest.iter().product();
    let scale = (1.0 / (1.0 - p)) as f32;
    let mask: Vec<f32> = (0..count)
        .map(|_| if rng.gen::<f64>() >= p { scale } else { 0.0 })
        .collect();
    let mut mask_shape = vec![1];
    mask_shape.extend_from_slice(&rest);
    let mask = Tensor::from_vec(mask, mask_shape, x.device())?.to_dtype(x.dtype())?;
    x.broadcast_mul(&mask)
}

/// `max(x, slope * x)`
pub fn leaky_relu(x: &Tensor, slope: f64) -> Result<Tensor> {
    x.maximum(&(x * slope)?)
}

/// L2-normalise along the last dimension
pub fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x
        .sqr()?
        .sum_keepdim(candle_core::D::Minus1)?
        .sqrt()?
        .maximum(1e-12)?;
    x.broadcast_div(&norm)
}

/// Zero-filled `(batch, len, dim)` frame buffer
pub fn zeros_frames(batch: usize, len: usize, dim: usize, device: &Device) -> Result<Tensor> {
    Tensor::zeros((batch, len, dim), DType::F32, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sinusoid_table_first_rows() {
        let table = sinusoid_table(4, 6, &Device::Cpu).unwrap();
        let rows = table.to_vec2::<f32>().unwrap();
        // position 0: sin(0) = 0, cos(0) = 1
        assert_eq!(rows[0], vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        // position 1, column 0: sin(1)
        assert!((rows[1][0] - 1f32.sin()).abs() < 1e-6);
        assert!((rows[1][1] - 1f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn test_relative_ids_are_clipped() {
        let ids = relative_position_ids(4, 2);
        // row 0: distances 0, -1, -2, -3 -> clipped to -2
        assert_eq!(&ids[0..4], &[2, 1, 0, 0]);
        // row 3: distances 3, 2, 1, 0 -> clipped to max - 1 = 1
        assert_eq!(&ids[12..16], &[3, 3, 3, 2]);
    }

    #[test]
    fn test_dropout_keeps_or_scales() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let x = Tensor::ones((1, 3, 8), DType::F32, &Device::Cpu).unwrap();
        let y = consistent_dropout(&x, 0.5, &mut rng).unwrap();
        for v in y.flatten_all().unwrap().to_vec1::<f32>().unwrap() {
            assert!(v == 0.0 || (v - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dropout_mask_shared_across_batch() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let x = Tensor::ones((2, 1, 16), DType::F32, &Device::Cpu).unwrap();
        let y = consistent_dropout(&x, 0.5, &mut rng).unwrap();
        let rows = y.squeeze(1).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn test_leaky_relu() {
        let x = Tensor::new(&[-2.0f32, 0.0, 3.0], &Device::Cpu).unwrap();
        let y = leaky_relu(&x, 0.1).unwrap().to_vec1::<f32>().unwrap();
        assert!((y[0] + 0.2).abs() < 1e-6);
        assert_eq!(y[1], 0.0);
        assert_eq!(y[2], 3.0);
    }

    #[test]
    fn test_l2_normalize() {
        let x = Tensor::new(&[[3.0f32, 4.0]], &Device::Cpu).unwrap();
        let y = l2_normalize(&x).unwrap().to_vec2::<f32>().unwrap();
        assert!((y[0][0] - 0.6).abs() < 1e-6);
        assert!((y[0][1] - 0.8).abs() < 1e-6);

        // zero vector stays zero instead of NaN
        let z = Tensor::zeros((1, 4), DType::F32, &Device::Cpu).unwrap();
        let y = l2_normalize(&z).unwrap().to_vec2::<f32>().unwrap();
        assert!(y[0].iter().all(|v| *v == 0.0));
    }
}
