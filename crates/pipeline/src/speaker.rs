//! Reference speaker embeddings
//!
//! The default voice is one x-vector from the CMU ARCTIC archive on the hub.
//! Entries are enumerated the way the dataset builder walks the extracted
//! archive: only files under the top directory, hidden (`.`) and private
//! (`__`) names skipped, file names sorted within each directory. The
//! configured index selects one of them.

use std::fs::File;
use std::path::{Path, PathBuf};

use candle_core::{DType, Tensor};
use tts_demo_config::constants::{models, speaker as speaker_defaults};
use tts_demo_config::SpeakerConfig;
use tts_demo_core::{Error, Result, SpeakerEmbedding, SpeakerFetcher};
use zip::ZipArchive;

use crate::hub::HubClient;

/// Read a 1-D (or `(1, D)`) float `.npy` file
pub fn embedding_from_npy(path: &Path) -> Result<SpeakerEmbedding> {
    let values = Tensor::read_npy(path)
        .and_then(|t| t.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>())
        .map_err(|e| Error::fetch(format!("failed to read x-vector {}: {e}", path.display())))?;
    SpeakerEmbedding::new(values)
}

/// Top directory of an archive, e.g. `spkrec-xvect` for `spkrec-xvect.zip`
pub fn archive_root(archive: &str) -> String {
    Path::new(archive)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_skipped(component: &str) -> bool {
    component.starts_with('.') || component.starts_with("__")
}

/// Walk-order key of an entry under `root`, or `None` when the walk skips it
fn walk_key(name: &str, root: &str) -> Option<(Vec<String>, String)> {
    if name.ends_with('/') || !name.ends_with(".npy") {
        return None;
    }
    let mut components = name.split('/').filter(|c| !c.is_empty());
    if components.next()? != root {
        return None;
    }
    let mut rest: Vec<String> = components.map(str::to_string).collect();
    if rest.iter().any(|c| is_skipped(c)) {
        return None;
    }
    let file = rest.pop()?;
    Some((rest, file))
}

/// Name of the `index`-th x-vector under `root` in dataset order
pub fn select_entry<I, S>(names: I, root: &str, index: usize) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut entries: Vec<((Vec<String>, String), String)> = names
        .into_iter()
        .map(Into::into)
        .filter_map(|name| walk_key(&name, root).map(|key| (key, name)))
        .collect();
    entries.sort();
    let len = entries.len();
    entries
        .into_iter()
        .nth(index)
        .map(|(_, name)| name)
        .ok_or_else(|| {
            Error::fetch(format!(
                "speaker index {index} out of range, {root}/ holds {len} embeddings"
            ))
        })
}

/// Extract and parse the `index`-th x-vector under `root` of a zip archive
pub fn embedding_from_archive(
    archive_path: &Path,
    root: &str,
    index: usize,
) -> Result<SpeakerEmbedding> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        Error::fetch(format!("failed to read archive {}: {e}", archive_path.display()))
    })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let name = select_entry(names, root, index)?;
    let mut entry = archive
        .by_name(&name)
        .map_err(|e| Error::fetch(format!("failed to open archive entry {name}: {e}")))?;

    let mut extracted = tempfile::Builder::new().suffix(".npy").tempfile()?;
    std::io::copy(&mut entry, extracted.as_file_mut())?;
    tracing::debug!(entry = %name, index, "Extracted speaker x-vector");
    embedding_from_npy(extracted.path())
}

/// Speaker embedding from the x-vector dataset on the hub
pub struct DatasetSpeakerFetcher {
    config: SpeakerConfig,
    cache_dir: Option<PathBuf>,
}

impl DatasetSpeakerFetcher {
    pub fn new(config: SpeakerConfig, cache_dir: Option<PathBuf>) -> Self {
        Self { config, cache_dir }
    }
}

impl SpeakerFetcher for DatasetSpeakerFetcher {
    fn fetch(&self) -> Result<SpeakerEmbedding> {
        let hub = HubClient::new(models::DEFAULT_REVISION, self.cache_dir.as_deref())?;
        let archive = hub.dataset_file(&self.config.dataset_id, &self.config.archive)?;
        let root = archive_root(&self.config.archive);
        let embedding = embedding_from_archive(&archive, &root, self.config.index)?;
        tracing::info!(
            dataset = %self.config.dataset_id,
            index = self.config.index,
            dim = embedding.dim(),
            "Speaker embedding loaded"
        );
        Ok(embedding)
    }

    fn describe(&self) -> String {
        format!(
            "{}/{} #{}",
            self.config.dataset_id, self.config.archive, self.config.index
        )
    }
}

/// Speaker embedding from a local `.npy` file
pub struct NpyFileSpeakerFetcher {
    path: PathBuf,
}

impl NpyFileSpeakerFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SpeakerFetcher for NpyFileSpeakerFetcher {
    fn fetch(&self) -> Result<SpeakerEmbedding> {
        if !self.path.exists() {
            return Err(Error::fetch(format!(
                "x-vector file not found: {}",
                self.path.display()
            )));
        }
        embedding_from_npy(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory embedding (offline mode)
pub struct FixedSpeakerFetcher {
    embedding: SpeakerEmbedding,
}

impl FixedSpeakerFetcher {
    pub fn new(embedding: SpeakerEmbedding) -> Self {
        Self { embedding }
    }

    /// All-zero x-vector of the standard dimension
    pub fn zeros() -> Self {
        Self::new(SpeakerEmbedding::zeros(speaker_defaults::EMBEDDING_DIM))
    }
}

impl SpeakerFetcher for FixedSpeakerFetcher {
    fn fetch(&self) -> Result<SpeakerEmbedding> {
        Ok(self.embedding.clone())
    }

    fn describe(&self) -> String {
        format!("fixed ({} values)", self.embedding.dim())
    }
}
