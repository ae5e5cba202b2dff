//! Text to token ids

use std::path::Path;

use tokenizers::Tokenizer;
use tts_demo_core::{Error, Result};

/// Character-level SpeechT5 tokenizer
pub struct TextProcessor {
    tokenizer: Tokenizer,
    eos_token_id: u32,
}

impl TextProcessor {
    pub fn new(tokenizer: Tokenizer, eos_token_id: u32) -> Self {
        Self {
            tokenizer,
            eos_token_id,
        }
    }

    /// Load a `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>, eos_token_id: u32) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| Error::fetch(format!("failed to load tokenizer {}: {e}", path.display())))?;
        Ok(Self::new(tokenizer, eos_token_id))
    }

    /// Token ids for `text`, terminated by exactly one end-of-sequence id
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::inference(format!("tokenization failed: {e}")))?;
        let ids = finalize_ids(encoding.get_ids().to_vec(), self.eos_token_id);
        if ids.len() < 2 {
            return Err(Error::inference("text produced no tokens"));
        }
        Ok(ids)
    }
}

/// Append `eos` unless the tokenizer's post-processor already did
pub fn finalize_ids(mut ids: Vec<u32>, eos: u32) -> Vec<u32> {
    if ids.last() != Some(&eos) {
        ids.push(eos);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_appends_eos_once() {
        assert_eq!(finalize_ids(vec![4, 5, 6], 2), vec![4, 5, 6, 2]);
        assert_eq!(finalize_ids(vec![4, 5, 2], 2), vec![4, 5, 2]);
        assert_eq!(finalize_ids(vec![], 2), vec![2]);
    }

    #[test]
    fn test_missing_tokenizer_file_is_fetch_error() {
        let err = TextProcessor::from_file("/nonexistent/tokenizer.json", 2)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
