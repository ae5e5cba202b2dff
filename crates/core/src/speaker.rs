//! Speaker embedding (x-vector)

use crate::error::{Error, Result};

/// Fixed-length vector conditioning the synthesis model on one voice.
///
/// Logically shaped `1 × D`; stored flat.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerEmbedding {
    values: Vec<f32>,
}

impl SpeakerEmbedding {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::fetch("speaker embedding is empty"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::fetch("speaker embedding contains non-finite values"));
        }
        Ok(Self { values })
    }

    /// All-zero embedding of the given dimension
    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// `(rows, cols)`; always a single row
    pub fn shape(&self) -> (usize, usize) {
        (1, self.values.len())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// L2 norm of the vector
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_shape() {
        let emb = SpeakerEmbedding::new(vec![0.5; 512]).unwrap();
        assert_eq!(emb.shape(), (1, 512));
        assert_eq!(emb.dim(), 512);
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(SpeakerEmbedding::new(vec![]).is_err());
        assert!(SpeakerEmbedding::new(vec![0.1, f32::NAN]).is_err());
    }

    #[test]
    fn test_norm() {
        let emb = SpeakerEmbedding::new(vec![3.0, 4.0]).unwrap();
        assert!((emb.norm() - 5.0).abs() < 1e-6);
        assert_eq!(SpeakerEmbedding::zeros(4).norm(), 0.0);
    }
}
