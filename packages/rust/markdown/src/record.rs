//! Output record assembly and rendering.

use doctidy_shared::{CodeBlock, DocTidyError, Difficulty, RecordConfig, Result};
use serde_yaml::{Mapping, Number, Value};

use crate::category::section_of;
use crate::fence::{Block, split_blocks};

/// Title, category, tags and difficulty derived for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub title: String,
    pub category: String,
    /// Ordered, deduplicated, at most the configured cap.
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
}

/// The assembled result for one document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub source_id: String,
    pub classification: Classification,
    /// Ordered frontmatter mapping.
    pub frontmatter: Mapping,
    /// Clean markdown body with labelled fences.
    pub body: String,
    pub code_blocks: Vec<CodeBlock>,
    code_examples_section: bool,
}

/// Everything the assembler merges.
pub(crate) struct RecordParts<'a> {
    pub source_id: &'a str,
    pub classification: Classification,
    pub body: String,
    pub code_blocks: Vec<CodeBlock>,
    pub carried: Option<Mapping>,
    pub date: &'a str,
}

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

fn strings(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| string(s)).collect())
}

/// Merge derived fields into a record. Generated keys win over carried ones.
pub(crate) fn assemble(parts: RecordParts<'_>, config: &RecordConfig) -> OutputRecord {
    let RecordParts {
        source_id,
        classification,
        body,
        code_blocks,
        carried,
        date,
    } = parts;

    let body = demote_extra_h1s(&body, &classification.title);
    let lower = body.to_lowercase();
    let integrations: Vec<String> = config
        .integrations
        .iter()
        .filter(|name| !name.is_empty() && lower.contains(&name.to_lowercase()))
        .cloned()
        .collect();

    let mut fm = Mapping::new();
    fm.insert(string("title"), string(&classification.title));
    fm.insert(string("category"), string(&classification.category));
    fm.insert(string("section"), string(section_of(&classification.category)));
    fm.insert(string("tags"), strings(&classification.tags));
    fm.insert(string("difficulty"), string(classification.difficulty.as_str()));
    fm.insert(string("has_code_examples"), Value::Bool(!code_blocks.is_empty()));
    fm.insert(
        string("code_examples"),
        Value::Number(Number::from(code_blocks.len() as u64)),
    );
    if !integrations.is_empty() {
        fm.insert(string("integrations"), strings(&integrations));
    }
    fm.insert(string("source"), string(source_id));
    fm.insert(string("last_updated"), string(date));

    for (key, value) in carried.unwrap_or_default() {
        if fm.contains_key(&key) {
            tracing::trace!(?key, "source frontmatter key overridden");
            continue;
        }
        fm.insert(key, value);
    }

    OutputRecord {
        source_id: source_id.to_string(),
        classification,
        frontmatter: fm,
        body,
        code_blocks,
        code_examples_section: config.code_examples_section,
    }
}

/// Demote every H1 to H2, except a leading `# <title>` line.
fn demote_extra_h1s(body: &str, title: &str) -> String {
    let title_line = format!("# {title}");
    let mut out = String::with_capacity(body.len() + 8);
    let mut first_line = true;

    for block in split_blocks(body) {
        match block {
            Block::Fenced(fence) => {
                out.push_str(fence.raw);
                first_line = false;
            }
            Block::Prose(prose) => {
                for line in prose.split_inclusive('\n') {
                    let text = line.trim_end();
                    let is_h1 = text.starts_with("# ") || text.starts_with("#\t");
                    if is_h1 && !(first_line && text == title_line) {
                        out.push('#');
                    }
                    out.push_str(line);
                    first_line = false;
                }
            }
        }
    }

    out
}

impl OutputRecord {
    pub fn title(&self) -> &str {
        &self.classification.title
    }

    pub fn category(&self) -> &str {
        &self.classification.category
    }

    /// Top-level section (first category segment).
    pub fn section(&self) -> &str {
        section_of(&self.classification.category)
    }

    pub fn has_code_examples(&self) -> bool {
        !self.code_blocks.is_empty()
    }

    /// Render the persisted form:
    /// `---\n<yaml>---\n\n# <title>\n\n<body>\n` plus an optional code examples section.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.frontmatter).map_err(|e| {
            DocTidyError::Conversion(format!("frontmatter for {}: {e}", self.source_id))
        })?;

        let title_line = format!("# {}", self.title());
        let body = self.body.trim();
        let mut out = String::with_capacity(yaml.len() + body.len() + title_line.len() + 16);

        out.push_str("---\n");
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n\n");

        if body.lines().next() != Some(title_line.as_str()) {
            out.push_str(&title_line);
            out.push_str("\n\n");
        }
        out.push_str(body);
        out.push('\n');

        if self.code_examples_section && !self.code_blocks.is_empty() {
            out.push_str("\n## Code Examples\n");
            for block in &self.code_blocks {
                out.push('\n');
                out.push_str(&block.to_fenced());
                out.push('\n');
            }
        }

        Ok(out)
    }
}
