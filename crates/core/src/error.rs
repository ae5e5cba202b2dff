//! Error taxonomy
//!
//! Only `EmptyInput` is recovered locally (as a warning). Every other variant
//! aborts the current request and is reported as an application error.

use thiserror::Error;

/// Errors raised anywhere between the HTTP surface and the models
#[derive(Error, Debug)]
pub enum Error {
    /// Model, tokenizer or dataset could not be fetched on first load
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Blank text submitted
    #[error("input text is empty")]
    EmptyInput,

    /// Tokenization, generation or vocoding failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Writing, reading or removing the temporary audio file failed
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the request can continue (shown as a warning instead of an error)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::EmptyInput)
    }

    pub fn fetch(msg: impl std::fmt::Display) -> Self {
        Error::Fetch(msg.to_string())
    }

    pub fn inference(msg: impl std::fmt::Display) -> Self {
        Error::Inference(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
