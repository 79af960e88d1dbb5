//! Document normalization pipeline.
//!
//! Turns one scraped page ([`RawDocument`]) into an [`OutputRecord`] or a skip
//! signal. Stages run in a fixed order:
//! 1. sanitize (frontmatter split, rule set, leading boilerplate skip)
//! 2. resolve the title and category from the source identifier and clean text
//! 3. extract tags and difficulty
//! 4. relabel code fences
//! 5. assemble the record
//!
//! The pipeline does no I/O and holds no mutable state; one [`Pipeline`] can
//! normalize any number of documents.

mod category;
mod cleanup;
mod code_blocks;
mod fence;
mod record;
pub mod rules;
mod tags;
mod title;

use doctidy_shared::{DocTidyError, PipelineConfig, RawDocument, Result};
use tracing::{debug, instrument};

pub use category::{categorize, section_of};
pub use cleanup::{Sanitized, clean, sanitize};
pub use code_blocks::{NormalizedCode, normalize_code_blocks, sniff_language};
pub use fence::{Block, Fence, split_blocks};
pub use record::{Classification, OutputRecord};
pub use tags::{assess_difficulty, extract_tags};
pub use title::resolve_title;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a document produced no record. Skips are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source identifier names a non-documentation asset.
    ExcludedSource { fingerprint: String },
    /// Too little content survived cleaning.
    TooShort { length: usize, minimum: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExcludedSource { fingerprint } => {
                write!(f, "excluded source (matches '{fingerprint}')")
            }
            Self::TooShort { length, minimum } => {
                write!(f, "content too short after cleaning ({length} < {minimum} chars)")
            }
        }
    }
}

/// Terminal state of one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Assembled(OutputRecord),
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured pipeline. Configuration is fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    date: String,
}

impl Pipeline {
    /// Build a pipeline stamping `date` into every record.
    pub fn new(config: &PipelineConfig, date: impl Into<String>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            date: date.into(),
        })
    }

    /// Normalize one document.
    ///
    /// Returns `Err` only for input that is not text (NUL bytes).
    #[instrument(skip_all, fields(source = %doc.source_id))]
    pub fn normalize(&self, doc: &RawDocument) -> Result<Outcome> {
        if doc.raw_text.contains('\0') {
            return Err(DocTidyError::parse(format!(
                "{} contains NUL bytes and is not a text document",
                doc.source_id
            )));
        }

        if let Some(fingerprint) = self.excluded_fingerprint(&doc.source_id) {
            debug!(fingerprint, "excluded source");
            return Ok(Outcome::Skipped(SkipReason::ExcludedSource {
                fingerprint: fingerprint.to_string(),
            }));
        }

        let sanitized = sanitize(&doc.raw_text, &self.config.sanitize);
        let length = sanitized.content.chars().count();
        let minimum = self.config.sanitize.min_content_length;
        if length < minimum {
            debug!(length, minimum, "too short after cleaning");
            return Ok(Outcome::Skipped(SkipReason::TooShort { length, minimum }));
        }

        let content = sanitized.content.as_str();
        let classification = Classification {
            title: resolve_title(&doc.source_id, content, &self.config.titles),
            category: categorize(&doc.source_id, content, &self.config.categories),
            tags: extract_tags(content, &self.config.tags),
            difficulty: assess_difficulty(content, &self.config.difficulty),
        };
        debug!(
            title = %classification.title,
            category = %classification.category,
            difficulty = %classification.difficulty,
            "classified"
        );

        let code = normalize_code_blocks(content, &self.config.code);
        let record = record::assemble(
            record::RecordParts {
                source_id: &doc.source_id,
                classification,
                body: code.body,
                code_blocks: code.blocks,
                carried: sanitized.frontmatter,
                date: &self.date,
            },
            &self.config.record,
        );

        Ok(Outcome::Assembled(record))
    }

    fn excluded_fingerprint(&self, source_id: &str) -> Option<&str> {
        let lower = source_id.to_lowercase();
        self.config
            .sanitize
            .excluded_sources
            .iter()
            .map(String::as_str)
            .find(|fp| !fp.is_empty() && lower.contains(&fp.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
