//! Core traits and types for the text-to-speech demo
//!
//! Everything the pipeline and server crates agree on lives here:
//! - the error taxonomy shared by every layer
//! - audio and speaker value types
//! - the seams between request handling and model inference

pub mod audio;
pub mod error;
pub mod request;
pub mod speaker;
pub mod traits;

pub use audio::AudioBuffer;
pub use error::{Error, Result};
pub use request::SynthesisRequest;
pub use speaker::SpeakerEmbedding;
pub use traits::{ModelFetcher, SpeakerFetcher, SpeechSynthesizer};
