//! Input configuration: which documents to read and who is reading them.
//!
//! ```json
//! {
//!   "documents": [{"filename": "guide.pdf"}],
//!   "persona": {"role": "Travel Planner"},
//!   "job_to_be_done": {"task": "Plan a trip of 4 days for a group of 10 college friends."}
//! }
//! ```
//!
//! Unknown keys are ignored.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobToBeDone {
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub documents: Vec<DocumentRef>,
    pub persona: Persona,
    pub job_to_be_done: JobToBeDone,
}

impl InputConfig {
    /// Load from a JSON file. Missing keys are fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Parse JSON text; `origin` only labels errors.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.filename.as_str())
    }
}
