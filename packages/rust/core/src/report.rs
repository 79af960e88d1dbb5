//! Knowledge-base overview files and run reports.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use doctidy_shared::{Result, RunId, Toc, TocEntry};

use crate::accumulator::RunAccumulator;
use crate::assembler::{write_atomic, write_json};
use crate::toc::document_count;

pub const README_FILE: &str = "README.md";
pub const REPORT_FILE: &str = "REPORT.md";
pub const RUN_LOG_FILE: &str = "run_log.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const EXAMPLES_FILE: &str = "EXAMPLES_INDEX.md";
pub const GLOSSARY_FILE: &str = "GLOSSARY.md";

/// Run facts that are not accumulated per document.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub run_id: &'a RunId,
    pub record_date: &'a str,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate counters written to `metadata.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub record_date: String,
    pub generated_at: DateTime<Utc>,
    pub total_files: usize,
    pub skipped: usize,
    pub errors: usize,
    pub code_examples_count: usize,
    pub categories: BTreeMap<String, usize>,
    pub tags: BTreeMap<String, usize>,
    pub difficulty: BTreeMap<String, usize>,
    pub glossary_terms: usize,
}

/// Write every report file. Returns the names of the files written.
#[instrument(skip_all, fields(run_id = %ctx.run_id))]
pub fn write_reports(
    output_root: &Path,
    ctx: &ReportContext<'_>,
    acc: &RunAccumulator,
    toc: &Toc,
) -> Result<Vec<&'static str>> {
    let mut written = vec![README_FILE, REPORT_FILE, RUN_LOG_FILE, METADATA_FILE];

    write_atomic(&output_root.join(README_FILE), &render_readme(ctx, acc, toc))?;
    write_atomic(&output_root.join(REPORT_FILE), &render_report(ctx, acc))?;
    write_json(&output_root.join(RUN_LOG_FILE), &acc.log())?;
    write_json(&output_root.join(METADATA_FILE), &metadata(ctx, acc))?;

    if let Some(examples) = render_examples(acc) {
        write_atomic(&output_root.join(EXAMPLES_FILE), &examples)?;
        written.push(EXAMPLES_FILE);
    }
    if let Some(glossary) = render_glossary(acc) {
        write_atomic(&output_root.join(GLOSSARY_FILE), &glossary)?;
        written.push(GLOSSARY_FILE);
    }

    info!(files = written.len(), "reports written");
    Ok(written)
}

pub fn metadata(ctx: &ReportContext<'_>, acc: &RunAccumulator) -> RunMetadata {
    RunMetadata {
        run_id: ctx.run_id.to_string(),
        record_date: ctx.record_date.to_string(),
        generated_at: ctx.generated_at,
        total_files: acc.processed(),
        skipped: acc.skipped(),
        errors: acc.errors(),
        code_examples_count: acc.code_example_count(),
        categories: acc
            .categories()
            .iter()
            .map(|(category, titles)| (category.clone(), titles.len()))
            .collect(),
        tags: acc.tag_counts().clone(),
        difficulty: acc
            .difficulties()
            .iter()
            .map(|(difficulty, count)| (difficulty.as_str().to_string(), *count))
            .collect(),
        glossary_terms: acc.glossary().len(),
    }
}

pub fn render_readme(ctx: &ReportContext<'_>, acc: &RunAccumulator, toc: &Toc) -> String {
    let mut out = String::from("# Knowledge Base\n\n## Overview\n\n");
    out.push_str(
        "Documentation cleaned of scraping artifacts, categorized, and tagged for reference.\n\n",
    );
    out.push_str("## Structure\n");

    for (idx, section) in toc.sections.iter().enumerate() {
        let count = document_count(section);
        out.push_str(&format!("\n### {:02}. {}\n\n", idx + 1, section.title));
        let plural = if count == 1 { "" } else { "s" };
        out.push_str(&format!("{count} document{plural}\n\n"));
        push_links(&mut out, &section.children, 0);
    }

    out.push_str("\n## Statistics\n\n");
    out.push_str(&format!("- Total documents: {}\n", acc.processed()));
    out.push_str(&format!("- Code examples: {}\n", acc.code_example_count()));
    out.push_str(&format!("- Last updated: {}\n", ctx.record_date));
    out
}

fn push_links(out: &mut String, entries: &[TocEntry], depth: usize) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        if entry.children.is_empty() {
            out.push_str(&format!("{indent}- [{}]({})\n", entry.title, entry.path));
        } else {
            out.push_str(&format!("{indent}- **{}**\n", entry.title));
            push_links(out, &entry.children, depth + 1);
        }
    }
}

pub fn render_report(ctx: &ReportContext<'_>, acc: &RunAccumulator) -> String {
    let mut out = String::from("# Documentation Processing Report\n\n");
    out.push_str(&format!(
        "**Date:** {}\n\n",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("**Run:** {}\n\n", ctx.run_id));

    out.push_str("## Summary\n\n");
    out.push_str(&format!("- **Total Files Processed:** {}\n", acc.processed()));
    out.push_str(&format!("- **Skipped:** {}\n", acc.skipped()));
    out.push_str(&format!("- **Errors:** {}\n", acc.errors()));
    out.push_str(&format!("- **Success Rate:** {:.1}%\n", acc.success_rate()));
    out.push_str(&format!("- **Code Examples:** {}\n", acc.code_example_count()));

    if !acc.categories().is_empty() {
        out.push_str("\n## Categories Processed\n\n");
        for (category, titles) in acc.categories() {
            out.push_str(&format!("- **{category}:** {} files\n", titles.len()));
        }
    }

    let top = acc.top_tags(10);
    if !top.is_empty() {
        out.push_str("\n## Common Tags Found\n\n");
        for (tag, count) in top {
            out.push_str(&format!("- **{tag}:** {count} occurrences\n"));
        }
    }

    if !acc.difficulties().is_empty() {
        out.push_str("\n## Difficulty Distribution\n\n");
        for (difficulty, count) in acc.difficulties() {
            out.push_str(&format!("- **{difficulty}:** {count}\n"));
        }
    }

    if acc.errors() > 0 {
        out.push_str("\n## Errors Encountered\n\n");
        for entry in acc.log() {
            if let Some(error) = &entry.error {
                out.push_str(&format!("- {}: {error}\n", entry.file));
            }
        }
    }

    out
}

/// `EXAMPLES_INDEX.md`, or `None` when no code was collected.
pub fn render_examples(acc: &RunAccumulator) -> Option<String> {
    if acc.examples().is_empty() {
        return None;
    }
    let mut out = String::from("# Code Examples Index\n\n");
    for example in acc.examples() {
        out.push_str(&format!(
            "## {}\n\n{}\n\n---\n\n",
            example.title,
            example.block.to_fenced()
        ));
    }
    Some(out)
}

/// `GLOSSARY.md` grouped by initial letter, or `None` when no terms were found.
pub fn render_glossary(acc: &RunAccumulator) -> Option<String> {
    if acc.glossary().is_empty() {
        return None;
    }

    let mut groups: BTreeMap<char, Vec<(&str, &str)>> = BTreeMap::new();
    for (term, definition) in acc.glossary() {
        let initial = term
            .chars()
            .next()
            .filter(|c| c.is_alphabetic())
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('#');
        groups
            .entry(initial)
            .or_default()
            .push((term.as_str(), definition.as_str()));
    }

    let mut out = String::from("# Glossary\n");
    for (initial, mut terms) in groups {
        terms.sort_by_key(|(term, _)| term.to_lowercase());
        out.push_str(&format!("\n## {initial}\n\n"));
        for (term, definition) in terms {
            out.push_str(&format!("**{term}**: {definition}\n\n"));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctidy_markdown::{Outcome, Pipeline, SkipReason};
    use doctidy_shared::{DocumentMeta, OutputConfig, PipelineConfig, RawDocument};

    use crate::toc::build_toc;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("doctidy-report-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn populated() -> (RunAccumulator, Toc) {
        let pipeline = Pipeline::new(&PipelineConfig::default(), "2025-01-23").unwrap();
        let text = "# Query All Records\n\nReturns every row of a database table.\n\n\
                    **Paging**: Splits a large result set into pages.\n\n\
                    **cursor**: Position marker used for the next page.\n\n\
                    ```sql\nSELECT * FROM users\n```\n";
        let Outcome::Assembled(record) = pipeline
            .normalize(&RawDocument::new("the-database/query-all.md", text))
            .unwrap()
        else {
            panic!("expected a record");
        };

        let mut acc = RunAccumulator::new(50);
        acc.record_assembled(&record, "03-data-operations/query-all-records.md", text.len());
        acc.record_skip(
            "nav.md",
            &SkipReason::TooShort {
                length: 4,
                minimum: 30,
            },
        );
        acc.record_error("logo.md", "parse error: logo.md contains NUL bytes");

        let toc = build_toc(
            &[DocumentMeta {
                path: "03-data-operations/query-all-records.md".into(),
                source: "the-database/query-all.md".into(),
                title: "Query All Records".into(),
                category: "data-operations".into(),
                sha256: String::new(),
                size_bytes: 0,
            }],
            &OutputConfig::default(),
        );
        (acc, toc)
    }

    fn ctx(run_id: &RunId) -> ReportContext<'_> {
        ReportContext {
            run_id,
            record_date: "2025-01-23",
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn readme_lists_sections_and_links() {
        let (acc, toc) = populated();
        let run_id = RunId::new();
        let readme = render_readme(&ctx(&run_id), &acc, &toc);
        assert!(readme.starts_with("# Knowledge Base\n"));
        assert!(readme.contains("### 01. Data Operations\n\n1 document\n"));
        assert!(readme.contains(
            "- [Query All Records](03-data-operations/query-all-records.md)"
        ));
        assert!(readme.contains("- Total documents: 1\n"));
        assert!(readme.contains("- Last updated: 2025-01-23\n"));
    }

    #[test]
    fn report_summarizes_counts_and_errors() {
        let (acc, _) = populated();
        let run_id = RunId::new();
        let report = render_report(&ctx(&run_id), &acc);
        assert!(report.contains("- **Total Files Processed:** 1\n"));
        assert!(report.contains("- **Skipped:** 1\n"));
        assert!(report.contains("- **Success Rate:** 50.0%\n"));
        assert!(report.contains("- **data-operations:** 1 files\n"));
        assert!(report.contains("- **Database:** 1 occurrences\n"));
        assert!(report.contains("## Difficulty Distribution"));
        assert!(report.contains("- logo.md: parse error: logo.md contains NUL bytes\n"));
    }

    #[test]
    fn glossary_groups_by_initial() {
        let (acc, _) = populated();
        let glossary = render_glossary(&acc).unwrap();
        assert!(glossary.contains("\n## C\n\n**cursor**: Position marker used for the next page.\n"));
        assert!(glossary.contains("\n## P\n\n**Paging**: Splits a large result set into pages.\n"));
        assert!(glossary.find("## C").unwrap() < glossary.find("## P").unwrap());
    }

    #[test]
    fn optional_files_are_omitted_when_empty() {
        let acc = RunAccumulator::new(50);
        assert!(render_examples(&acc).is_none());
        assert!(render_glossary(&acc).is_none());
    }

    #[test]
    fn write_reports_creates_files() {
        let tmp = temp_dir();
        let (acc, toc) = populated();
        let run_id = RunId::new();

        let written = write_reports(&tmp, &ctx(&run_id), &acc, &toc).unwrap();
        assert_eq!(written.len(), 6);
        for name in &written {
            assert!(tmp.join(name).exists(), "missing {name}");
        }

        let examples = std::fs::read_to_string(tmp.join(EXAMPLES_FILE)).unwrap();
        assert!(examples.contains("## Query All Records\n\n```sql\nSELECT * FROM users\n```\n\n---\n"));

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.join(METADATA_FILE)).unwrap())
                .unwrap();
        assert_eq!(meta["total_files"], 1);
        assert_eq!(meta["categories"]["data-operations"], 1);

        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.join(RUN_LOG_FILE)).unwrap())
                .unwrap();
        assert_eq!(log.as_array().map(Vec::len), Some(3));
        assert_eq!(log[1]["status"], "skipped");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
