//! Output document assembly and serialization

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::config::InputConfig;
use crate::error::Result;
use crate::ranking::RankedSection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Documents that contributed at least one extracted section
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_documents: Vec<FailedDocument>,
}

/// A document skipped because it could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDocument {
    pub document: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub metadata: Metadata,
    pub extracted_sections: Vec<ExtractedSection>,
}

impl OutputDocument {
    /// Build the output, stamping it with the current local time.
    pub fn new(input: &InputConfig, sections: &[RankedSection], failed: Vec<FailedDocument>) -> Self {
        Self::with_timestamp(input, sections, failed, now_iso8601())
    }

    pub fn with_timestamp(
        input: &InputConfig,
        sections: &[RankedSection],
        failed_documents: Vec<FailedDocument>,
        processing_timestamp: String,
    ) -> Self {
        let mut input_documents: Vec<String> = Vec::new();
        for section in sections {
            if !input_documents.contains(&section.document) {
                input_documents.push(section.document.clone());
            }
        }

        let extracted_sections = sections
            .iter()
            .map(|s| ExtractedSection {
                document: s.document.clone(),
                section_title: s.title.clone(),
                importance_rank: s.rank,
                page_number: s.page,
            })
            .collect();

        Self {
            metadata: Metadata {
                input_documents,
                persona: input.persona.role.clone(),
                job_to_be_done: input.job_to_be_done.task.clone(),
                processing_timestamp,
                failed_documents,
            },
            extracted_sections,
        }
    }

    /// Pretty JSON with a four-space indent.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only ever writes valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Local time, ISO-8601 with microseconds and offset.
pub fn now_iso8601() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
