//! Request handling state machine
//!
//! ```text
//! Idle -> Generating -> Done -> Idle
//! Idle -> Rejected -> Idle
//! Idle -> Generating -> Idle        (failure)
//! ```
//!
//! A successful request writes `speech_<uuid>.wav` to the output directory,
//! buffers its bytes and deletes it before returning. The file is also
//! removed when anything fails after it was created.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tts_demo_config::constants::{audio, ui};
use tts_demo_core::{AudioBuffer, Error, Result, SynthesisRequest};
use tts_demo_pipeline::{synthesize, write_wav, ModelProvider, SpeakerEmbeddingProvider};
use uuid::Uuid;

/// UI-visible request state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Rejected,
    Generating,
    Done,
}

impl RequestPhase {
    fn can_enter(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Idle, Rejected) | (Idle, Generating) | (Generating, Done) | (Generating, Idle)
                | (Done, Idle) | (Rejected, Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Idle => "idle",
            RequestPhase::Rejected => "rejected",
            RequestPhase::Generating => "generating",
            RequestPhase::Done => "done",
        }
    }
}

/// Phase history of one request
#[derive(Debug, Clone)]
pub struct RequestSession {
    history: Vec<RequestPhase>,
}

impl Default for RequestSession {
    fn default() -> Self {
        Self {
            history: vec![RequestPhase::Idle],
        }
    }
}

impl RequestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RequestPhase {
        self.history
            .last()
            .copied()
            .unwrap_or(RequestPhase::Idle)
    }

    /// Every phase visited, starting with `Idle`
    pub fn history(&self) -> &[RequestPhase] {
        &self.history
    }

    fn enter(&mut self, next: RequestPhase) {
        let current = self.phase();
        debug_assert!(current.can_enter(next), "{current:?} -> {next:?}");
        tracing::debug!(from = current.as_str(), to = next.as_str(), "Request phase");
        self.history.push(next);
    }
}

/// Finished synthesis, ready for playback and download
#[derive(Debug, Clone)]
pub struct GeneratedSpeech {
    pub filename: String,
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub num_samples: usize,
}

/// What the page shows after a request
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Rejected { warning: &'static str },
    Completed(GeneratedSpeech),
}

/// Uniquely named temporary WAV file, removed on drop
pub struct TempAudioFile {
    path: PathBuf,
    filename: String,
}

impl TempAudioFile {
    /// Reserve a fresh `speech_<uuid>.wav` name in `dir`
    pub fn new_in(dir: &Path) -> Self {
        let filename = format!(
            "{}{}{}",
            audio::FILE_PREFIX,
            Uuid::new_v4(),
            audio::FILE_EXTENSION
        );
        Self {
            path: dir.join(&filename),
            filename,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Delete the file now, reporting failures
    pub fn remove(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        tracing::debug!(file = %self.filename, "Removed temporary audio file");
        Ok(())
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(file = %self.filename, error = %e, "Failed to remove temporary audio file");
            }
        }
    }
}

/// Encodes a buffer into the temporary WAV file
pub type WavWriter = fn(&AudioBuffer, &Path) -> Result<()>;

fn write_wav_file(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    write_wav(buffer, path)
}

/// Drives one text submission through the pipeline
pub struct SpeechRequestHandler {
    models: Arc<ModelProvider>,
    speakers: Arc<SpeakerEmbeddingProvider>,
    output_dir: PathBuf,
    write: WavWriter,
}

impl SpeechRequestHandler {
    pub fn new(
        models: Arc<ModelProvider>,
        speakers: Arc<SpeakerEmbeddingProvider>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            models,
            speakers,
            output_dir: output_dir.into(),
            write: write_wav_file,
        }
    }

    /// Replace the WAV encoder used for the temporary file
    pub fn with_wav_writer(mut self, write: WavWriter) -> Self {
        self.write = write;
        self
    }

    pub fn models(&self) -> &ModelProvider {
        &self.models
    }

    pub fn speakers(&self) -> &SpeakerEmbeddingProvider {
        &self.speakers
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Handle one "Generate Speech" trigger
    ///
    /// Blank text is answered with a warning without touching the models.
    /// Errors leave the session back in `Idle`.
    pub fn handle(&self, session: &mut RequestSession, text: &str) -> Result<RequestOutcome> {
        let request = match SynthesisRequest::new(text) {
            Ok(request) => request,
            Err(Error::EmptyInput) => {
                session.enter(RequestPhase::Rejected);
                tracing::info!("Rejected blank input");
                metrics::counter!("tts_requests_total", "outcome" => "rejected").increment(1);
                session.enter(RequestPhase::Idle);
                return Ok(RequestOutcome::Rejected {
                    warning: ui::EMPTY_INPUT_WARNING,
                });
            }
            Err(e) => return Err(e),
        };

        session.enter(RequestPhase::Generating);
        match self.generate(request) {
            Ok(speech) => {
                session.enter(RequestPhase::Done);
                metrics::counter!("tts_requests_total", "outcome" => "success").increment(1);
                session.enter(RequestPhase::Idle);
                Ok(RequestOutcome::Completed(speech))
            }
            Err(e) => {
                tracing::error!(error = %e, "Speech generation failed");
                metrics::counter!("tts_requests_total", "outcome" => "error").increment(1);
                session.enter(RequestPhase::Idle);
                Err(e)
            }
        }
    }

    fn generate(&self, request: SynthesisRequest) -> Result<GeneratedSpeech> {
        let synthesizer = self.models.get()?;
        let speaker = self.speakers.get()?;

        let start = Instant::now();
        let buffer = synthesize(request.text(), synthesizer.as_ref(), &speaker)?;
        let elapsed = start.elapsed().as_secs_f64();
        metrics::histogram!("tts_synthesis_seconds").record(elapsed);
        metrics::histogram!("tts_audio_seconds").record(buffer.duration_secs());

        let file = TempAudioFile::new_in(&self.output_dir);
        (self.write)(&buffer, file.path())?;
        let wav = std::fs::read(file.path())?;
        let filename = file.filename().to_string();
        file.remove()?;

        tracing::info!(
            file = %filename,
            samples = buffer.len(),
            audio_secs = buffer.duration_secs(),
            synthesis_secs = elapsed,
            "Speech generated"
        );

        Ok(GeneratedSpeech {
            filename,
            wav,
            sample_rate: buffer.sample_rate,
            duration_secs: buffer.duration_secs(),
            num_samples: buffer.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tts_demo_core::{
        AudioBuffer, ModelFetcher, SpeakerEmbedding, SpeakerFetcher, SpeechSynthesizer,
    };
    use tts_demo_pipeline::{FixedSpeakerFetcher, StubModelFetcher, StubSynthesizer};

    struct CountingModelFetcher {
        calls: Arc<AtomicUsize>,
    }

    impl ModelFetcher for CountingModelFetcher {
        fn fetch(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubSynthesizer::default()))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    struct FailingSynthesizer;

    impl SpeechSynthesizer for FailingSynthesizer {
        fn synthesize(&self, _text: &str, _speaker: &SpeakerEmbedding) -> Result<AudioBuffer> {
            Err(Error::inference("decoder diverged"))
        }

        fn sample_rate(&self) -> u32 {
            16000
        }

        fn speaker_dim(&self) -> usize {
            512
        }
    }

    struct FailingModelFetcher;

    impl ModelFetcher for FailingModelFetcher {
        fn fetch(&self) -> Result<Arc<dyn SpeechSynthesizer>> {
            Ok(Arc::new(FailingSynthesizer))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    struct OfflineSpeakerFetcher;

    impl SpeakerFetcher for OfflineSpeakerFetcher {
        fn fetch(&self) -> Result<SpeakerEmbedding> {
            Err(Error::fetch("dataset unreachable"))
        }

        fn describe(&self) -> String {
            "offline".to_string()
        }
    }

    fn handler_with(models: impl ModelFetcher + 'static, dir: &Path) -> SpeechRequestHandler {
        SpeechRequestHandler::new(
            Arc::new(ModelProvider::new(models)),
            Arc::new(SpeakerEmbeddingProvider::new(FixedSpeakerFetcher::zeros())),
            dir,
        )
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_default_text_completes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_with(StubModelFetcher, dir.path());
        let mut session = RequestSession::new();

        let outcome = handler
            .handle(&mut session, "Hello, my dog is cute.")
            .unwrap();
        let RequestOutcome::Completed(speech) = outcome else {
            panic!("expected completed outcome");
        };

        assert_eq!(
            session.history(),
            &[
                RequestPhase::Idle,
                RequestPhase::Generating,
                RequestPhase::Done,
                RequestPhase::Idle
            ]
        );
        assert_eq!(speech.sample_rate, 16000);
        assert!(speech.duration_secs > 0.0);
        assert!(speech.num_samples > 0);
        assert_eq!(&speech.wav[..4], b"RIFF");
        assert!(speech.filename.starts_with("speech_"));
        assert!(speech.filename.ends_with(".wav"));
        assert!(!dir.path().join(&speech.filename).exists());
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_blank_input_is_rejected_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = handler_with(
            CountingModelFetcher {
                calls: calls.clone(),
            },
            dir.path(),
        );

        for text in ["", "   ", "\n\t"] {
            let mut session = RequestSession::new();
            let outcome = handler.handle(&mut session, text).unwrap();
            assert!(matches!(
                outcome,
                RequestOutcome::Rejected { warning } if warning == ui::EMPTY_INPUT_WARNING
            ));
            assert_eq!(
                session.history(),
                &[RequestPhase::Idle, RequestPhase::Rejected, RequestPhase::Idle]
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!handler.models().is_loaded());
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_filenames_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_with(StubModelFetcher, dir.path());

        let mut names = Vec::new();
        for _ in 0..2 {
            let mut session = RequestSession::new();
            match handler.handle(&mut session, "Hi").unwrap() {
                RequestOutcome::Completed(speech) => names.push(speech.filename),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn test_models_loaded_once_across_requests() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = handler_with(
            CountingModelFetcher {
                calls: calls.clone(),
            },
            dir.path(),
        );

        for text in ["one", "two", "three"] {
            handler.handle(&mut RequestSession::new(), text).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inference_failure_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler_with(FailingModelFetcher, dir.path());
        let mut session = RequestSession::new();

        let err = handler.handle(&mut session, "Hello").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(
            session.history(),
            &[RequestPhase::Idle, RequestPhase::Generating, RequestPhase::Idle]
        );
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_speaker_fetch_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let handler = SpeechRequestHandler::new(
            Arc::new(ModelProvider::new(StubModelFetcher)),
            Arc::new(SpeakerEmbeddingProvider::new(OfflineSpeakerFetcher)),
            dir.path(),
        );

        let err = handler.handle(&mut RequestSession::new(), "Hello").unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[test]
    fn test_unwritable_output_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let handler = handler_with(StubModelFetcher, &missing);

        let err = handler.handle(&mut RequestSession::new(), "Hello").unwrap_err();
        assert!(matches!(err, Error::FileIo(_)));
    }

    fn truncated_writer(buffer: &AudioBuffer, path: &Path) -> Result<()> {
        std::fs::write(path, &buffer.samples.len().to_le_bytes())?;
        Err(Error::FileIo(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "disk full",
        )))
    }

    #[test]
    fn test_write_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let handler =
            handler_with(StubModelFetcher, dir.path()).with_wav_writer(truncated_writer);
        let mut session = RequestSession::new();

        let err = handler.handle(&mut session, "Hello").unwrap_err();
        assert!(matches!(err, Error::FileIo(_)));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(
            session.history(),
            &[RequestPhase::Idle, RequestPhase::Generating, RequestPhase::Idle]
        );
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let file = TempAudioFile::new_in(dir.path());
            std::fs::write(file.path(), b"partial").unwrap();
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
