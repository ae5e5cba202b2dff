//! Per-action synthesis request

use crate::error::{Error, Result};

/// Text submitted by one user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
}

impl SynthesisRequest {
    /// Validate the submitted text; blank input is rejected
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_rejected() {
        for text in ["", " ", "\n\t  "] {
            assert!(matches!(SynthesisRequest::new(text), Err(Error::EmptyInput)));
        }
    }

    #[test]
    fn test_text_kept_verbatim() {
        let req = SynthesisRequest::new("  Hello, my dog is cute. ").unwrap();
        assert_eq!(req.text(), "  Hello, my dog is cute. ");
    }
}
