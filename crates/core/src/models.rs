use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::report::PdfReport;

/// Owner of one logical collection in the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn collection_name(&self) -> String {
        format!("user_{}", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub doc_id: String,
    pub title: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub doc_id: String,
    pub title: String,
    pub page: u32,
    pub text: String,
    pub chunk_index: u64,
}

impl Passage {
    pub fn metadata(&self) -> PassageMetadata {
        PassageMetadata {
            doc_id: self.doc_id.clone(),
            title: self.title.clone(),
            page: self.page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPassage {
    pub id: String,
    pub document: String,
    pub metadata: PassageMetadata,
    pub embedding: Vec<f32>,
}

/// Nearest neighbours as parallel arrays, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<PassageMetadata>,
    pub distances: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub snippet: String,
    pub doc_id: String,
    pub title: String,
    pub page: u32,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSentence {
    pub score: f64,
    pub sentence: String,
    pub page: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub doc_id: Option<String>,
    /// Keep only hits at or below this distance, e.g. 0.85 for strong matches.
    #[serde(default)]
    pub max_distance: Option<f32>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: default_top_k(),
            doc_id: None,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub results: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub doc_id: String,
    pub title: String,
    pub saved_as: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: PdfReport,
    pub indexed_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionOptions {
    pub max_words: usize,
    pub overlap_words: usize,
    /// Pages with fewer normalized characters are flagged in the page report.
    pub min_page_chars: usize,
    pub preview_pages: usize,
    pub preview_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_words: 220,
            overlap_words: 60,
            min_page_chars: 80,
            preview_pages: 5,
            preview_chars: 160,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOptions {
    /// Lower bound on neighbours fetched per question, so that dedup and
    /// distance filtering still leave enough hits.
    pub min_fetch: usize,
    pub snippet_chars: usize,
    pub dedupe_head_len: usize,
    pub max_sentences: usize,
    pub list_limit: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            min_fetch: 10,
            snippet_chars: 800,
            dedupe_head_len: 200,
            max_sentences: 3,
            list_limit: 2_000,
        }
    }
}
