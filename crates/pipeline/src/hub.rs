//! Hugging Face hub access
//!
//! Thin wrapper over the blocking `hf-hub` client. Files land in the shared
//! hub cache, so only the first run downloads anything.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use tts_demo_config::constants::models;
use tts_demo_core::{Error, Result};

/// Hub client bound to one revision and cache directory
#[derive(Clone)]
pub struct HubClient {
    api: Api,
    revision: String,
}

impl HubClient {
    /// Build a client; `HF_TOKEN` is used when set
    pub fn new(revision: impl Into<String>, cache_dir: Option<&Path>) -> Result<Self> {
        let mut builder = ApiBuilder::new();
        if let Some(token) = std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()) {
            builder = builder.with_token(Some(token));
        }
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir.to_path_buf());
        }
        let api = builder
            .build()
            .map_err(|e| Error::fetch(format!("failed to create hub client: {e}")))?;
        Ok(Self {
            api,
            revision: revision.into(),
        })
    }

    fn get(&self, repo_id: &str, repo_type: RepoType, filename: &str) -> Result<PathBuf> {
        let repo = self.api.repo(Repo::with_revision(
            repo_id.to_string(),
            repo_type,
            self.revision.clone(),
        ));
        tracing::debug!(repo = repo_id, file = filename, "Resolving hub file");
        repo.get(filename)
            .map_err(|e| Error::fetch(format!("failed to download {filename} from {repo_id}: {e}")))
    }

    /// Local path of a model repository file, downloading it if needed
    pub fn model_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf> {
        self.get(repo_id, RepoType::Model, filename)
    }

    /// Local path of a dataset repository file, downloading it if needed
    pub fn dataset_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf> {
        self.get(repo_id, RepoType::Dataset, filename)
    }

    /// Parse a repository's `config.json`
    pub fn model_config<T: serde::de::DeserializeOwned>(&self, repo_id: &str) -> Result<T> {
        let path = self.model_file(repo_id, models::CONFIG_FILE)?;
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::fetch(format!("invalid {} in {repo_id}: {e}", models::CONFIG_FILE)))
    }

    /// Weights of a repository as a `VarBuilder`
    ///
    /// Prefers `model.safetensors` (memory-mapped) and falls back to
    /// `pytorch_model.bin`.
    pub fn weights(&self, repo_id: &str, device: &Device) -> Result<VarBuilder<'static>> {
        match self.model_file(repo_id, models::SAFETENSORS_FILE) {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Loading safetensors weights");
                // SAFETY: hub cache files are not modified while mapped
                unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
                    .map_err(|e| Error::fetch(format!("failed to map weights of {repo_id}: {e}")))
            }
            Err(safetensors_err) => {
                tracing::debug!(
                    repo = repo_id,
                    error = %safetensors_err,
                    "No safetensors weights, trying PyTorch checkpoint"
                );
                let path = self.model_file(repo_id, models::PYTORCH_FILE)?;
                VarBuilder::from_pth(&path, DType::F32, device)
                    .map_err(|e| Error::fetch(format!("failed to read weights of {repo_id}: {e}")))
            }
        }
    }
}
