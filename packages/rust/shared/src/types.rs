//! Core domain types shared by the pipeline and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one batch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RawDocument
// ---------------------------------------------------------------------------

/// A scraped page as read by the caller. Immutable pipeline input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Path-like, slash-separated identifier (e.g. `the-database/add-record.md`).
    pub source_id: String,
    /// Unprocessed page text.
    pub raw_text: String,
}

impl RawDocument {
    pub fn new(source_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// File stem of the last segment of a source identifier
/// (`the-database/query-all.md` -> `query-all`).
pub fn file_stem(source_id: &str) -> &str {
    let last = source_id.rsplit(['/', '\\']).next().unwrap_or(source_id);
    match last.rfind('.') {
        Some(idx) if idx > 0 => &last[..idx],
        _ => last,
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Coarse reading level derived from keyword counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CodeBlock
// ---------------------------------------------------------------------------

/// A fenced code block after language resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language declared by the source (`None` when it had to be inferred).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// Language written on the rewritten fence.
    pub language: String,
    /// Code between the fences, without the declaration line.
    pub body: String,
}

impl CodeBlock {
    /// Render as a fenced block with its language tag.
    pub fn to_fenced(&self) -> String {
        format!("```{}\n{}\n```", self.language, self.body)
    }
}

// ---------------------------------------------------------------------------
// Toc
// ---------------------------------------------------------------------------

/// A single entry in the knowledge-base table of contents (`toc.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocEntry {
    /// Display title.
    pub title: String,
    /// Path relative to the output root, without `.md` for documents.
    pub path: String,
    /// Source identifier the document was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Nested child entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

/// Root structure for `toc.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toc {
    /// Top-level sections in configured order.
    pub sections: Vec<TocEntry>,
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// One written document as listed in `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Path relative to the output root.
    pub path: String,
    /// Source identifier.
    pub source: String,
    pub title: String,
    pub category: String,
    /// SHA-256 of the written file.
    pub sha256: String,
    pub size_bytes: usize,
}

/// The `manifest.json` written at the root of each output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that produced the output.
    pub tool_version: String,
    /// Input root the documents were read from.
    pub input_dir: String,
    /// Date value stamped into every record of the run.
    pub record_date: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(default)]
    pub documents: Vec<DocumentMeta>,
}
