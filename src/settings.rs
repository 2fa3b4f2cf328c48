//! Application settings storage
//!
//! Stores where PDFs and the embedding model live in a JSON file in the user
//! config directory. Every field has a default, so a missing or partial file is
//! fine. Environment variables take precedence over stored values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::local_embeddings::{ModelSource, MODEL_ID, REVISION};

pub const PDF_DIR_ENV: &str = "SECTIONRANK_PDF_DIR";
pub const MODEL_DIR_ENV: &str = "SECTIONRANK_MODEL_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory the input filenames are resolved against
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    /// Local sentence-transformers directory, used when complete
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Hugging Face Hub fallback
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_model_revision")]
    pub model_revision: String,
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("./pdf")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./model/all-MiniLM-L6-v2")
}

fn default_model_id() -> String {
    MODEL_ID.to_string()
}

fn default_model_revision() -> String {
    REVISION.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            model_dir: default_model_dir(),
            model_id: default_model_id(),
            model_revision: default_model_revision(),
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    pub fn load(path: &Path) -> Self {
        let settings = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                    Settings::default()
                }),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        };
        settings.with_env_overrides()
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        fs::write(path, content).map_err(|e| Error::io(path, e))
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_path(PDF_DIR_ENV) {
            self.pdf_dir = dir;
        }
        if let Some(dir) = env_path(MODEL_DIR_ENV) {
            self.model_dir = dir;
        }
        self
    }

    pub fn model_source(&self) -> ModelSource {
        ModelSource::resolve(Some(&self.model_dir), &self.model_id, &self.model_revision)
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// `<config dir>/sectionrank/settings.json`, or `./settings.json` when the
/// platform has no config directory.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("sectionrank"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("settings.json")
}
