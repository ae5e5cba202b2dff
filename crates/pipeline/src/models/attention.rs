//! Multi-head attention with optional relative position bias and KV cache

use candle_core::{Module, Result, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Cached keys and values `(batch, heads, len, head_dim)`
#[derive(Clone)]
pub struct KvCache {
    pub keys: Tensor,
    pub values: Tensor,
}

impl KvCache {
    pub fn len(&self) -> Result<usize> {
        self.keys.dim(2)
    }
}

pub struct Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scaling: f64,
}

impl Attention {
    pub fn new(dim: usize, num_heads: usize, vb: VarBuilder) -> Result<Self> {
        if dim % num_heads != 0 {
            candle_core::bail!("hidden size {} not divisible by {} heads", dim, num_heads);
        }
        let head_dim = dim / num_heads;
        Ok(Self {
            q_proj: linear(dim, dim, vb.pp("q_proj"))?,
            k_proj: linear(dim, dim, vb.pp("k_proj"))?,
            v_proj: linear(dim, dim, vb.pp("v_proj"))?,
            out_proj: linear(dim, dim, vb.pp("out_proj"))?,
            num_heads,
            head_dim,
            scaling: (head_dim as f64).powf(-0.5),
        })
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// `(batch, len, dim)` -> `(batch, heads, len, head_dim)`
    fn split_heads(&self, x: &Tensor) -> Result<Tensor> {
        let (b, t, _) = x.dims3()?;
        x.reshape((b, t, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// Project keys and values, e.g. once for the encoder output in cross-attention
    pub fn project_kv(&self, x: &Tensor) -> Result<KvCache> {
        Ok(KvCache {
            keys: self.split_heads(&self.k_proj.forward(x)?)?,
            values: self.split_heads(&self.v_proj.forward(x)?)?,
        })
    }

    /// Self-attention over `x` with an optional `(len, len, head_dim)` relative bias
    pub fn forward_self(&self, x: &Tensor, position_bias: Option<&Tensor>) -> Result<Tensor> {
        let kv = self.project_kv(x)?;
        self.attend(x, &kv, position_bias)
    }

    /// Self-attention for one decoding step; appends the step to `cache`
    pub fn forward_cached(&self, x: &Tensor, cache: &mut Option<KvCache>) -> Result<Tensor> {
        let step = self.project_kv(x)?;
        let kv = match cache.take() {
            Some(prev) => KvCache {
                keys: Tensor::cat(&[&prev.keys, &step.keys], 2)?,
                values: Tensor::cat(&[&prev.values, &step.values], 2)?,
            },
            None => step,
        };
        let out = self.attend(x, &kv, None)?;
        *cache = Some(kv);
        Ok(out)
    }

    /// Attend from `x` to precomputed keys and values
    pub fn attend(&self, x: &Tensor, kv: &KvCache, position_bias: Option<&Tensor>) -> Result<Tensor> {
        let (b, t, dim) = x.dims3()?;
        let q = (self.split_heads(&self.q_proj.forward(x)?)? * self.scaling)?;

        let mut weights = q.matmul(&kv.keys.t()?.contiguous()?)?;

        if let Some(bias) = position_bias {
            // (len_q, b*h, head_dim) x (len_q, head_dim, len_k) -> (len_q, b*h, len_k)
            let q_t = q
                .reshape((b * self.num_heads, t, self.head_dim))?
                .transpose(0, 1)?
                .contiguous()?;
            let rel = q_t.matmul(&bias.transpose(1, 2)?.contiguous()?)?;
            let len_k = rel.dim(2)?;
            let rel = rel
                .transpose(0, 1)?
                .reshape((b, self.num_heads, t, len_k))?;
            weights = (weights + rel)?;
        }

        let weights = candle_nn::ops::softmax_last_dim(&weights)?;
        let out = weights.matmul(&kv.values)?;
        let out = out.transpose(1, 2)?.reshape((b, t, dim))?;
        self.out_proj.forward(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_cache_grows_one_step_at_a_time() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let attn = Attention::new(8, 2, vb).unwrap();
        let mut cache = None;
        for step in 1..=3 {
            let x = Tensor::ones((1, 1, 8), DType::F32, &Device::Cpu).unwrap();
            let y = attn.forward_cached(&x, &mut cache).unwrap();
            assert_eq!(y.dims(), &[1, 1, 8]);
            assert_eq!(cache.as_ref().unwrap().len().unwrap(), step);
        }
    }

    #[test]
    fn test_position_bias_shape_accepted() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let attn = Attention::new(8, 2, vb).unwrap();
        let x = Tensor::ones((1, 5, 8), DType::F32, &Device::Cpu).unwrap();
        let bias = Tensor::ones((5, 5, attn.head_dim()), DType::F32, &Device::Cpu).unwrap();
        let y = attn.forward_self(&x, Some(&bias)).unwrap();
        assert_eq!(y.dims(), &[1, 5, 8]);
    }

    #[test]
    fn test_rejects_uneven_heads() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        assert!(Attention::new(10, 3, vb).is_err());
    }
}
