//! Configuration for the text-to-speech demo
//!
//! Layered settings (defaults → TOML file → `TTS_DEMO__*` environment) plus
//! the constants they default to.

pub mod constants;
mod settings;

pub use settings::{
    GenerationConfig, LogFormat, LoggingConfig, MetricsConfig, ModelBackend, ModelConfig,
    OutputConfig, ServerConfig, Settings, SpeakerConfig,
};
