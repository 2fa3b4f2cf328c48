//! Persona-driven section ranking for PDF batches.
//!
//! Headings are recovered from page layout (font size, style, alignment,
//! spacing, table exclusion) and ranked by embedding similarity against a
//! persona and a task.

pub mod config;
pub mod error;
pub mod headings;
pub mod layout;
pub mod local_embeddings;
pub mod output;
pub mod pipeline;
pub mod ranking;
pub mod settings;
pub mod similarity;
pub mod utils;

pub use error::{Error, Result};
