//! Centralized constants for the text-to-speech demo
//!
//! Single source of truth for model identifiers, audio format and the
//! user-facing strings. Settings defaults are built from these.

/// Pretrained artifacts on the Hugging Face Hub
pub mod models {
    /// Sequence-to-speech synthesis model
    pub const TTS_MODEL_ID: &str = "microsoft/speecht5_tts";

    /// HiFi-GAN vocoder matching the synthesis model
    pub const VOCODER_ID: &str = "microsoft/speecht5_hifigan";

    /// `tokenizers` serialisation of the SpeechT5 character tokenizer
    pub const TOKENIZER_ID: &str = "Xenova/speecht5_tts";

    pub const DEFAULT_REVISION: &str = "main";

    pub const CONFIG_FILE: &str = "config.json";
    pub const TOKENIZER_FILE: &str = "tokenizer.json";
    pub const SAFETENSORS_FILE: &str = "model.safetensors";
    pub const PYTORCH_FILE: &str = "pytorch_model.bin";
}

/// Reference speaker dataset
pub mod speaker {
    /// CMU ARCTIC x-vectors
    pub const DATASET_ID: &str = "Matthijs/cmu-arctic-xvectors";

    /// Archive holding one `.npy` x-vector per utterance
    pub const ARCHIVE: &str = "spkrec-xvect.zip";

    /// Index into the validation split (sorted archive entries)
    pub const DEFAULT_INDEX: usize = 7306;

    /// x-vector dimension
    pub const EMBEDDING_DIM: usize = 512;
}

/// Autoregressive decoding defaults
pub mod generation {
    /// Stop once the summed stop probability reaches this value
    pub const STOP_THRESHOLD: f64 = 0.5;

    /// Minimum decoder steps as a ratio of encoder length
    pub const MIN_LEN_RATIO: f64 = 0.0;

    /// Maximum decoder steps as a ratio of encoder length
    pub const MAX_LEN_RATIO: f64 = 20.0;
}

/// Audio output format
pub mod audio {
    /// Output sample rate (Hz)
    pub const SAMPLE_RATE: u32 = 16000;

    /// PCM bit depth of the WAV container
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub const CHANNELS: u16 = 1;

    pub const MIME_TYPE: &str = "audio/wav";

    /// Temporary file name is `{FILE_PREFIX}{uuid}{FILE_EXTENSION}`
    pub const FILE_PREFIX: &str = "speech_";
    pub const FILE_EXTENSION: &str = ".wav";
}

/// User-facing strings
pub mod ui {
    pub const TITLE: &str = "Text-to-Speech App";

    pub const INPUT_LABEL: &str = "Enter the text you want to convert to speech:";

    pub const DEFAULT_TEXT: &str = "Hello, my dog is cute.";

    pub const BUTTON_LABEL: &str = "Generate Speech";

    pub const PROGRESS_MESSAGE: &str = "Generating speech... Please wait.";

    pub const SUCCESS_MESSAGE: &str = "Speech generated successfully!";

    pub const EMPTY_INPUT_WARNING: &str = "Please enter some text before generating speech.";

    pub const DOWNLOAD_LABEL: &str = "Download Audio";

    /// Prepended to the cause of a failed request
    pub const ERROR_PREFIX: &str = "Speech generation failed: ";
}

/// Server defaults
pub mod server {
    pub const HOST: &str = "127.0.0.1";

    pub const PORT: u16 = 8501;

    /// Environment variable naming an explicit config file
    pub const CONFIG_PATH_ENV: &str = "TTS_DEMO_CONFIG";

    /// Config file looked up when no explicit path is given
    pub const DEFAULT_CONFIG_PATH: &str = "config/tts-demo.toml";

    /// Prefix for environment overrides (`TTS_DEMO__SERVER__PORT=9000`)
    pub const ENV_PREFIX: &str = "TTS_DEMO";
}
