//! Candle implementations of the pretrained models
//!
//! - **speecht5**: text encoder, autoregressive speech decoder, postnet
//! - **hifigan**: mel spectrogram to waveform vocoder
//! - **attention** / **modules**: shared building blocks

pub mod attention;
pub mod hifigan;
pub mod modules;
pub mod speecht5;

pub use hifigan::{HifiGan, HifiGanConfig};
pub use speecht5::{SpeechT5, SpeechT5Config};
