//! Layered settings
//!
//! Sources, lowest priority first:
//! 1. serde defaults (built from [`crate::constants`])
//! 2. TOML file (`TTS_DEMO_CONFIG`, else `config/tts-demo.toml` if present)
//! 3. Environment variables `TTS_DEMO__<SECTION>__<KEY>`

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tts_demo_core::{Error, Result};

use crate::constants;

/// Complete application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub speaker: SpeakerConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener and page defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Text pre-filled in the input box
    pub default_text: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: constants::server::HOST.to_string(),
            port: constants::server::PORT,
            default_text: constants::ui::DEFAULT_TEXT.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which synthesizer the model provider builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// SpeechT5 + HiFi-GAN fetched from the hub
    #[default]
    Speecht5,
    /// Offline tone generator (no network)
    Stub,
}

/// Pretrained artifact identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    pub tts_model_id: String,
    pub vocoder_id: String,
    pub tokenizer_id: String,
    pub revision: String,
    /// Run on the first CUDA device when the binary is built with `cuda`
    pub use_gpu: bool,
    /// Override for the hub cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            tts_model_id: constants::models::TTS_MODEL_ID.to_string(),
            vocoder_id: constants::models::VOCODER_ID.to_string(),
            tokenizer_id: constants::models::TOKENIZER_ID.to_string(),
            revision: constants::models::DEFAULT_REVISION.to_string(),
            use_gpu: false,
            cache_dir: None,
        }
    }
}

/// Reference voice selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    pub dataset_id: String,
    pub archive: String,
    /// Selects one of the reference voices in the dataset split
    pub index: usize,
    /// Local `.npy` x-vector used instead of the dataset
    pub embedding_path: Option<PathBuf>,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            dataset_id: constants::speaker::DATASET_ID.to_string(),
            archive: constants::speaker::ARCHIVE.to_string(),
            index: constants::speaker::DEFAULT_INDEX,
            embedding_path: None,
        }
    }
}

/// Autoregressive decoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub threshold: f64,
    pub minlenratio: f64,
    pub maxlenratio: f64,
    /// Seed for the prenet dropout; random when unset
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            threshold: constants::generation::STOP_THRESHOLD,
            minlenratio: constants::generation::MIN_LEN_RATIO,
            maxlenratio: constants::generation::MAX_LEN_RATIO,
            seed: None,
        }
    }
}

/// Where temporary audio files are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Settings {
    /// Load settings from the configured file (if any) and the environment
    pub fn load() -> Result<Self> {
        match std::env::var(constants::server::CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(Some(Path::new(&path)), true),
            Err(_) => Self::load_from(Some(Path::new(constants::server::DEFAULT_CONFIG_PATH)), false),
        }
    }

    /// Load settings from `path` (when given) layered under the environment
    pub fn load_from(path: Option<&Path>, required: bool) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(required));
        }
        builder = builder.add_source(
            Environment::with_prefix(constants::server::ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;

        settings.validate()?;
        tracing::debug!(?path, "Settings loaded");
        Ok(settings)
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".into()));
        }
        let gen = &self.generation;
        if !(gen.threshold > 0.0 && gen.threshold <= 1.0) {
            return Err(Error::Config(format!(
                "generation.threshold must be in (0, 1], got {}",
                gen.threshold
            )));
        }
        if gen.maxlenratio <= 0.0 {
            return Err(Error::Config(format!(
                "generation.maxlenratio must be positive, got {}",
                gen.maxlenratio
            )));
        }
        if gen.minlenratio < 0.0 || gen.minlenratio > gen.maxlenratio {
            return Err(Error::Config(format!(
                "generation.minlenratio must be in [0, maxlenratio], got {}",
                gen.minlenratio
            )));
        }
        if self.models.backend == ModelBackend::Speecht5 {
            let ids = [
                ("models.tts_model_id", &self.models.tts_model_id),
                ("models.vocoder_id", &self.models.vocoder_id),
                ("models.tokenizer_id", &self.models.tokenizer_id),
            ];
            for (key, value) in ids {
                if value.trim().is_empty() {
                    return Err(Error::Config(format!("{} must not be empty", key)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_app() {
        let settings = Settings::default();
        assert_eq!(settings.models.tts_model_id, "microsoft/speecht5_tts");
        assert_eq!(settings.models.vocoder_id, "microsoft/speecht5_hifigan");
        assert_eq!(settings.speaker.index, 7306);
        assert_eq!(settings.server.default_text, "Hello, my dog is cute.");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[speaker]
index = 42

[models]
backend = "stub"

[logging]
format = "json"
"#
        )
        .unwrap();

        let settings = Settings::load_from(Some(file.path()), true).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.speaker.index, 42);
        assert_eq!(settings.models.backend, ModelBackend::Stub);
        assert_eq!(settings.logging.format, LogFormat::Json);
        // untouched sections keep defaults
        assert_eq!(settings.generation.maxlenratio, 20.0);
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let settings =
            Settings::load_from(Some(Path::new("does/not/exist.toml")), false).unwrap();
        assert_eq!(settings.server.port, constants::server::PORT);
    }

    #[test]
    fn test_missing_required_file_is_config_error() {
        let err = Settings::load_from(Some(Path::new("does/not/exist.toml")), true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let mut settings = Settings::default();
        settings.generation.threshold = 0.0;
        assert!(settings.validate().is_err());

        settings.generation.threshold = 0.5;
        settings.generation.minlenratio = 30.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_model_id() {
        let mut settings = Settings::default();
        settings.models.vocoder_id = " ".into();
        assert!(settings.validate().is_err());

        // the stub backend never touches the hub
        settings.models.backend = ModelBackend::Stub;
        assert!(settings.validate().is_ok());
    }
}
