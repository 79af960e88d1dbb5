//! Run-wide statistics.
//!
//! The accumulator is owned by the batch loop and only changes through the
//! `record_*` methods, one call per document outcome. Two accumulators built
//! over disjoint document sets can be combined with [`RunAccumulator::merge`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use doctidy_markdown::{Block, OutputRecord, SkipReason, split_blocks};
use doctidy_shared::{CodeBlock, Difficulty};
use regex::Regex;
use serde::Serialize;

/// Glossary definitions written as `**Term**: definition`.
static GLOSSARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*([^*]{2,60})\*\*\s*[:\-–]\s*(.{10,})$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Skipped,
    Error,
}

/// One line of `run_log.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Source identifier.
    pub file: String,
    pub status: LogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Raw input size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_before: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    fn new(file: &str, status: LogStatus) -> Self {
        Self {
            file: file.to_string(),
            status,
            output: None,
            title: None,
            category: None,
            tags: Vec::new(),
            size_before: None,
            reason: None,
            error: None,
        }
    }
}

/// A code block collected for `EXAMPLES_INDEX.md`, with the title of its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExample {
    pub title: String,
    pub block: CodeBlock,
}

#[derive(Debug, Clone)]
pub struct RunAccumulator {
    processed: usize,
    skipped: usize,
    errors: usize,
    categories: BTreeMap<String, Vec<String>>,
    tags: BTreeMap<String, usize>,
    difficulties: BTreeMap<Difficulty, usize>,
    code_examples: usize,
    examples: Vec<CodeExample>,
    max_examples: usize,
    glossary: BTreeMap<String, String>,
    log: Vec<LogEntry>,
}

impl RunAccumulator {
    /// Create an empty accumulator collecting at most `max_examples` code examples.
    pub fn new(max_examples: usize) -> Self {
        Self {
            processed: 0,
            skipped: 0,
            errors: 0,
            categories: BTreeMap::new(),
            tags: BTreeMap::new(),
            difficulties: BTreeMap::new(),
            code_examples: 0,
            examples: Vec::new(),
            max_examples,
            glossary: BTreeMap::new(),
            log: Vec::new(),
        }
    }

    /// Record an assembled document written to `output` (relative path).
    pub fn record_assembled(&mut self, record: &OutputRecord, output: &str, size_before: usize) {
        self.processed += 1;
        self.categories
            .entry(record.category().to_string())
            .or_default()
            .push(record.title().to_string());
        for tag in &record.classification.tags {
            *self.tags.entry(tag.clone()).or_default() += 1;
        }
        *self
            .difficulties
            .entry(record.classification.difficulty)
            .or_default() += 1;

        self.code_examples += record.code_blocks.len();
        for block in &record.code_blocks {
            if self.examples.len() >= self.max_examples {
                break;
            }
            self.examples.push(CodeExample {
                title: record.title().to_string(),
                block: block.clone(),
            });
        }

        for (term, definition) in glossary_terms(&record.body) {
            self.glossary.entry(term).or_insert(definition);
        }

        let mut entry = LogEntry::new(&record.source_id, LogStatus::Success);
        entry.output = Some(output.to_string());
        entry.title = Some(record.title().to_string());
        entry.category = Some(record.category().to_string());
        entry.tags = record.classification.tags.clone();
        entry.size_before = Some(size_before);
        self.log.push(entry);
    }

    pub fn record_skip(&mut self, source_id: &str, reason: &SkipReason) {
        self.skipped += 1;
        let mut entry = LogEntry::new(source_id, LogStatus::Skipped);
        entry.reason = Some(reason.to_string());
        self.log.push(entry);
    }

    pub fn record_error(&mut self, source_id: &str, error: impl std::fmt::Display) {
        self.errors += 1;
        let mut entry = LogEntry::new(source_id, LogStatus::Error);
        entry.error = Some(error.to_string());
        self.log.push(entry);
    }

    /// Fold `other` into `self`. Counts add up, glossary terms already known
    /// to `self` keep their definition, and the example cap of `self` holds.
    pub fn merge(&mut self, other: RunAccumulator) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.errors += other.errors;
        for (category, titles) in other.categories {
            self.categories.entry(category).or_default().extend(titles);
        }
        for (tag, count) in other.tags {
            *self.tags.entry(tag).or_default() += count;
        }
        for (difficulty, count) in other.difficulties {
            *self.difficulties.entry(difficulty).or_default() += count;
        }
        self.code_examples += other.code_examples;
        let room = self.max_examples.saturating_sub(self.examples.len());
        self.examples.extend(other.examples.into_iter().take(room));
        for (term, definition) in other.glossary {
            self.glossary.entry(term).or_insert(definition);
        }
        self.log.extend(other.log);
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Category → titles of its documents, in processing order.
    pub fn categories(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    pub fn tag_counts(&self) -> &BTreeMap<String, usize> {
        &self.tags
    }

    /// The `n` most frequent tags; ties resolve alphabetically.
    pub fn top_tags(&self, n: usize) -> Vec<(&str, usize)> {
        let mut tags: Vec<(&str, usize)> =
            self.tags.iter().map(|(tag, count)| (tag.as_str(), *count)).collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tags.truncate(n);
        tags
    }

    pub fn difficulties(&self) -> &BTreeMap<Difficulty, usize> {
        &self.difficulties
    }

    /// Total code blocks across all assembled documents.
    pub fn code_example_count(&self) -> usize {
        self.code_examples
    }

    pub fn examples(&self) -> &[CodeExample] {
        &self.examples
    }

    pub fn glossary(&self) -> &BTreeMap<String, String> {
        &self.glossary
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Percentage of attempted documents that did not fail. Skips are not attempts.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.processed + self.errors;
        if attempted == 0 {
            return 100.0;
        }
        self.processed as f64 / attempted as f64 * 100.0
    }
}

/// Definitions found in prose; fenced code is not scanned.
fn glossary_terms(body: &str) -> Vec<(String, String)> {
    split_blocks(body)
        .into_iter()
        .filter_map(|block| match block {
            Block::Prose(prose) => Some(prose),
            Block::Fenced(_) => None,
        })
        .flat_map(str::lines)
        .filter_map(|line| {
            let caps = GLOSSARY_RE.captures(line.trim())?;
            let term = caps.get(1)?.as_str().trim();
            let definition = caps.get(2)?.as_str().trim();
            Some((term.to_string(), definition.to_string()))
        })
        .collect()
}
