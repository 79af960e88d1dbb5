//! Knowledge-base output assembler.
//!
//! Places rendered records under their section directories and writes the
//! run manifest. Every file is written atomically (temp file, then rename).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use doctidy_markdown::OutputRecord;
use doctidy_shared::{
    CURRENT_SCHEMA_VERSION, DocTidyError, DocumentMeta, OutputConfig, Result, RunManifest, Toc,
    file_stem,
};

/// Longest slug kept before cutting back to a hyphen.
const MAX_SLUG_LEN: usize = 60;

/// Slugs shorter than this get a prefix from their source directory.
const SHORT_SLUG_LEN: usize = 20;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const TOC_FILE: &str = "toc.json";

/// Relative output paths already claimed in this run.
#[derive(Debug, Default)]
pub struct PathRegistry {
    used: HashSet<String>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`, or the first free `<stem>-N.md` variant of it.
    pub fn claim(&mut self, path: String) -> String {
        if self.used.insert(path.clone()) {
            return path;
        }
        let stem = path.strip_suffix(".md").unwrap_or(&path);
        let mut n = 2;
        loop {
            let candidate = format!("{stem}-{n}.md");
            if self.used.insert(candidate.clone()) {
                debug!(original = %path, path = %candidate, "output path collision");
                return candidate;
            }
            n += 1;
        }
    }
}

/// Directory name for a top-level section (`03-data-operations`).
pub fn section_dir(section: &str, config: &OutputConfig) -> String {
    if config.numbered_sections {
        if let Some(idx) = config.section_order.iter().position(|s| s == section) {
            return format!("{:02}-{section}", idx + 1);
        }
    }
    section.to_string()
}

/// Turn a title into a file-name slug.
///
/// Lower-cased, punctuation dropped, whitespace and hyphen runs joined by a
/// single hyphen. Slugs longer than 60 characters are cut back to a hyphen.
pub fn slugify(title: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    static SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

    let lower = title.to_lowercase();
    let cleaned = PUNCT_RE.replace_all(&lower, "");
    let joined = SEP_RE.replace_all(&cleaned, "-");
    let slug = joined.trim_matches('-');

    if slug.chars().count() <= MAX_SLUG_LEN {
        return slug.to_string();
    }
    let cut: String = slug.chars().take(MAX_SLUG_LEN).collect();
    match cut.rfind('-') {
        Some(idx) if idx > 0 => cut[..idx].to_string(),
        _ => cut,
    }
}

/// Relative output path for a record, before collision handling.
pub fn document_path(record: &OutputRecord, config: &OutputConfig) -> String {
    let mut parts = vec![section_dir(record.section(), config)];
    parts.extend(
        record
            .category()
            .split('/')
            .skip(1)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
    parts.push(format!("{}.md", file_slug(record)));
    parts.join("/")
}

fn file_slug(record: &OutputRecord) -> String {
    let mut slug = slugify(record.title());
    if slug.is_empty() {
        slug = slugify(file_stem(&record.source_id));
    }
    if slug.is_empty() {
        return "untitled".to_string();
    }

    // Short slugs borrow the last word of their source directory.
    if slug.chars().count() < SHORT_SLUG_LEN {
        let prefix = record
            .source_id
            .rsplit_once(['/', '\\'])
            .and_then(|(dir, _)| dir.rsplit(['/', '\\']).next())
            .and_then(|dir| dir.rsplit('-').next())
            .map(slugify)
            .unwrap_or_default();
        if !prefix.is_empty() && !slug.contains(&prefix) {
            slug = format!("{prefix}-{slug}");
        }
    }
    slug
}

/// Render `record`, write it under `output_root` and return its manifest entry.
#[instrument(skip_all, fields(source = %record.source_id))]
pub fn assemble_document(
    output_root: &Path,
    record: &OutputRecord,
    config: &OutputConfig,
    paths: &mut PathRegistry,
) -> Result<DocumentMeta> {
    let rendered = record.render()?;
    let relative = paths.claim(document_path(record, config));
    let target = output_root.join(&relative);

    write_atomic(&target, &rendered)?;
    debug!(path = %relative, title = %record.title(), "wrote document");

    Ok(DocumentMeta {
        path: relative,
        source: record.source_id.clone(),
        title: record.title().to_string(),
        category: record.category().to_string(),
        sha256: sha256_hex(rendered.as_bytes()),
        size_bytes: rendered.len(),
    })
}

/// Write `manifest.json` and `toc.json`.
pub fn write_index(output_root: &Path, manifest: &RunManifest, toc: &Toc) -> Result<()> {
    write_json(&output_root.join(MANIFEST_FILE), manifest)?;
    write_json(&output_root.join(TOC_FILE), toc)
}

/// Verify that an output directory is well-formed.
///
/// Checks the manifest schema version, the presence of `toc.json`, and that
/// every listed document exists with its recorded checksum.
pub fn validate_output(output_root: &Path) -> Result<RunManifest> {
    let manifest_path = output_root.join(MANIFEST_FILE);
    let toc_path = output_root.join(TOC_FILE);

    if !manifest_path.exists() {
        return Err(DocTidyError::validation("missing manifest.json"));
    }
    if !toc_path.exists() {
        return Err(DocTidyError::validation("missing toc.json"));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| DocTidyError::io(&manifest_path, e))?;
    let manifest: RunManifest = serde_json::from_str(&content)
        .map_err(|e| DocTidyError::validation(format!("invalid manifest.json: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(DocTidyError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    let toc_content =
        std::fs::read_to_string(&toc_path).map_err(|e| DocTidyError::io(&toc_path, e))?;
    serde_json::from_str::<Toc>(&toc_content)
        .map_err(|e| DocTidyError::validation(format!("invalid toc.json: {e}")))?;

    for doc in &manifest.documents {
        let path = output_root.join(&doc.path);
        let bytes = std::fs::read(&path).map_err(|e| DocTidyError::io(&path, e))?;
        if sha256_hex(&bytes) != doc.sha256 {
            return Err(DocTidyError::validation(format!(
                "checksum mismatch for {}",
                doc.path
            )));
        }
    }

    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write `content` to `path` via a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| DocTidyError::io(parent, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DocTidyError::validation(format!("invalid output path {path:?}")))?;
    let temp: PathBuf = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| DocTidyError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocTidyError::io(path, e))?;
    Ok(())
}

/// Write a JSON file (pretty-printed).
pub(crate) fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| DocTidyError::Conversion(format!("JSON serialization failed: {e}")))?;
    write_atomic(path, &json)?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doctidy_markdown::{Outcome, Pipeline};
    use doctidy_shared::{PipelineConfig, RawDocument, RunId};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("doctidy-assembler-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(source_id: &str, text: &str) -> OutputRecord {
        let pipeline = Pipeline::new(&PipelineConfig::default(), "2025-01-23").unwrap();
        match pipeline.normalize(&RawDocument::new(source_id, text)).unwrap() {
            Outcome::Assembled(record) => record,
            Outcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    fn manifest(documents: Vec<DocumentMeta>) -> RunManifest {
        RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0-test".into(),
            input_dir: "raw-docs".into(),
            record_date: "2025-01-23".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            processed: documents.len(),
            skipped: 0,
            errors: 0,
            documents,
        }
    }

    #[test]
    fn slugify_common_titles() {
        assert_eq!(slugify("Query All Records"), "query-all-records");
        assert_eq!(slugify("  What's new?  "), "whats-new");
        assert_eq!(slugify("API -- Endpoints / Auth"), "api-endpoints-auth");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_cuts_long_titles_at_a_hyphen() {
        let title = "Connecting your workspace to external services with authenticated webhooks";
        let slug = slugify(title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert_eq!(slug, "connecting-your-workspace-to-external-services-with");
    }

    #[test]
    fn section_dirs_are_numbered_in_order() {
        let config = OutputConfig::default();
        assert_eq!(section_dir("getting-started", &config), "01-getting-started");
        assert_eq!(section_dir("reference", &config), "08-reference");
        assert_eq!(section_dir("misc", &config), "misc");

        let plain = OutputConfig {
            numbered_sections: false,
            ..OutputConfig::default()
        };
        assert_eq!(section_dir("reference", &plain), "reference");
    }

    #[test]
    fn document_paths_follow_category() {
        let config = OutputConfig::default();
        let rec = record(
            "the-database/query-all.md",
            "# Query All Records\n\nReturns every row of a table, with paging and sorting.",
        );
        assert_eq!(
            document_path(&rec, &config),
            "03-data-operations/database-query-all-records.md"
        );

        let rec = record(
            "filters/text-filters.md",
            "# Working with Text Filters\n\nText filters change the case of a string value.",
        );
        assert_eq!(rec.category(), "reference/filters");
        assert_eq!(
            document_path(&rec, &config),
            "08-reference/filters/working-with-text-filters.md"
        );
    }

    #[test]
    fn registry_suffixes_collisions() {
        let mut paths = PathRegistry::new();
        assert_eq!(paths.claim("a/b.md".into()), "a/b.md");
        assert_eq!(paths.claim("a/b.md".into()), "a/b-2.md");
        assert_eq!(paths.claim("a/b.md".into()), "a/b-3.md");
        assert_eq!(paths.claim("a/c.md".into()), "a/c.md");
    }

    #[test]
    fn assemble_writes_rendered_record() {
        let tmp = temp_dir();
        let rec = record(
            "the-database/query-all.md",
            "# Query All Records\n\nReturns every row of a table, with paging and sorting.",
        );
        let mut paths = PathRegistry::new();

        let meta = assemble_document(&tmp, &rec, &OutputConfig::default(), &mut paths).unwrap();
        let written = std::fs::read_to_string(tmp.join(&meta.path)).unwrap();

        assert_eq!(written, rec.render().unwrap());
        assert_eq!(meta.sha256, sha256_hex(written.as_bytes()));
        assert_eq!(meta.sha256.len(), 64);
        assert_eq!(meta.size_bytes, written.len());
        assert_eq!(meta.source, "the-database/query-all.md");

        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.join("03-data-operations"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let second = assemble_document(&tmp, &rec, &OutputConfig::default(), &mut paths).unwrap();
        assert_eq!(second.path, "03-data-operations/database-query-all-records-2.md");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validate_output_round_trip() {
        let tmp = temp_dir();
        let rec = record(
            "the-database/query-all.md",
            "# Query All Records\n\nReturns every row of a table, with paging and sorting.",
        );
        let meta =
            assemble_document(&tmp, &rec, &OutputConfig::default(), &mut PathRegistry::new())
                .unwrap();
        write_index(&tmp, &manifest(vec![meta.clone()]), &Toc { sections: vec![] }).unwrap();

        let loaded = validate_output(&tmp).unwrap();
        assert_eq!(loaded.documents.len(), 1);

        std::fs::write(tmp.join(&meta.path), "tampered").unwrap();
        let err = validate_output(&tmp).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn validate_output_missing_manifest() {
        let tmp = temp_dir();
        std::fs::write(tmp.join(TOC_FILE), "{}").unwrap();

        let err = validate_output(&tmp).unwrap_err();
        assert!(err.to_string().contains("missing manifest.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
