//! End-to-end batch run: input tree → normalize → knowledge base.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use tracing::{debug, info, instrument, warn};

use doctidy_markdown::{Outcome, Pipeline};
use doctidy_shared::{
    AppConfig, CURRENT_SCHEMA_VERSION, DocTidyError, DocumentMeta, OutputConfig, PipelineConfig,
    RawDocument, Result, RunId, RunManifest,
};

use crate::accumulator::RunAccumulator;
use crate::assembler::{self, PathRegistry};
use crate::backup::backup_output;
use crate::report::{self, ReportContext};
use crate::toc;

/// Configuration for [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Root of the scraped markdown tree.
    pub input_dir: PathBuf,
    /// Knowledge-base output directory.
    pub output_dir: PathBuf,
    /// Where an existing output directory is copied first. `None` disables backup.
    pub backup_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    /// Tool version string.
    pub tool_version: String,
}

impl BatchConfig {
    /// Build from the loaded application config.
    pub fn from_app_config(config: &AppConfig, tool_version: impl Into<String>) -> Self {
        Self {
            input_dir: PathBuf::from(&config.defaults.input_dir),
            output_dir: PathBuf::from(&config.defaults.output_dir),
            backup_dir: config
                .defaults
                .backup
                .then(|| PathBuf::from(&config.defaults.backup_dir)),
            pipeline: config.pipeline.clone(),
            output: config.output.clone(),
            tool_version: tool_version.into(),
        }
    }
}

/// Result of a batch run.
#[derive(Debug)]
pub struct BatchResult {
    pub run_id: RunId,
    pub output_dir: PathBuf,
    pub backup_path: Option<PathBuf>,
    /// The manifest written to `manifest.json`.
    pub manifest: RunManifest,
    pub accumulator: RunAccumulator,
    /// Report files written at the output root.
    pub reports: Vec<&'static str>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn processed(&self) -> usize {
        self.accumulator.processed()
    }

    pub fn skipped(&self) -> usize {
        self.accumulator.skipped()
    }

    pub fn errors(&self) -> usize {
        self.accumulator.errors()
    }
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each document reaches a terminal state.
    fn document_processed(&self, source_id: &str, current: usize, total: usize);
    /// Called when the batch completes.
    fn done(&self, result: &BatchResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_processed(&self, _source_id: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BatchResult) {}
}

/// Run a full batch.
///
/// 1. Back up the existing output directory (when enabled)
/// 2. Discover `**/*.md` under the input root
/// 3. Normalize and write each document
/// 4. Write `toc.json`, `manifest.json` and the reports
///
/// Per-document failures are logged and counted; only failures that affect
/// the whole run (unreadable input root, unwritable output) return `Err`.
#[instrument(skip_all, fields(input = %config.input_dir.display(), output = %config.output_dir.display()))]
pub fn run_batch(config: &BatchConfig, progress: &dyn ProgressReporter) -> Result<BatchResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();

    if !config.input_dir.is_dir() {
        return Err(DocTidyError::validation(format!(
            "input directory {} does not exist",
            config.input_dir.display()
        )));
    }

    let record_date = config.pipeline.record.date.resolve(started_at);
    let pipeline = Pipeline::new(&config.pipeline, record_date.clone())?;

    info!(%run_id, date = %record_date, "starting batch run");

    // --- Phase 1: Backup ---
    let backup_path = match &config.backup_dir {
        Some(backup_dir) => {
            progress.phase("Backing up existing output");
            backup_output(&config.output_dir, backup_dir, Local::now().naive_local())?
        }
        None => None,
    };

    // --- Phase 2: Discovery ---
    progress.phase("Discovering documents");
    let mut files = discover_documents(&config.input_dir)?;
    files.retain(|file| !file.starts_with(&config.output_dir));
    info!(count = files.len(), "documents discovered");

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| DocTidyError::io(&config.output_dir, e))?;

    // --- Phase 3: Normalize ---
    progress.phase("Normalizing documents");
    let mut acc = RunAccumulator::new(config.output.max_examples);
    let mut paths = PathRegistry::new();
    let mut documents: Vec<DocumentMeta> = Vec::new();
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        let source_id = source_id_for(&config.input_dir, file);
        match process_document(&pipeline, config, file, &source_id, &mut paths) {
            Ok(Processed::Written { record, meta, size }) => {
                acc.record_assembled(&record, &meta.path, size);
                documents.push(meta);
            }
            Ok(Processed::Skipped(reason)) => {
                debug!(source = %source_id, %reason, "document skipped");
                acc.record_skip(&source_id, &reason);
            }
            Err(e) => {
                warn!(source = %source_id, error = %e, "document failed");
                acc.record_error(&source_id, &e);
            }
        }
        progress.document_processed(&source_id, i + 1, total);
    }

    // --- Phase 4: Index and reports ---
    progress.phase("Writing index and reports");
    let toc = toc::build_toc(&documents, &config.output);
    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: run_id.clone(),
        tool_version: config.tool_version.clone(),
        input_dir: config.input_dir.display().to_string(),
        record_date: record_date.clone(),
        started_at,
        finished_at: Utc::now(),
        processed: acc.processed(),
        skipped: acc.skipped(),
        errors: acc.errors(),
        documents,
    };
    assembler::write_index(&config.output_dir, &manifest, &toc)?;

    let ctx = ReportContext {
        run_id: &run_id,
        record_date: &record_date,
        generated_at: manifest.finished_at,
    };
    let reports = report::write_reports(&config.output_dir, &ctx, &acc, &toc)?;

    let result = BatchResult {
        run_id,
        output_dir: config.output_dir.clone(),
        backup_path,
        manifest,
        accumulator: acc,
        reports,
        elapsed: start.elapsed(),
    };

    info!(
        processed = result.processed(),
        skipped = result.skipped(),
        errors = result.errors(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "batch run complete"
    );

    progress.done(&result);
    Ok(result)
}

/// Every `*.md` file under `root`, sorted by path.
pub fn discover_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let root_str = root.to_str().ok_or_else(|| {
        DocTidyError::validation(format!("input path {} is not valid UTF-8", root.display()))
    })?;
    let pattern = format!("{}/**/*.md", glob::Pattern::escape(root_str));

    let entries = glob::glob(&pattern)
        .map_err(|e| DocTidyError::validation(format!("invalid discovery pattern: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(path = %e.path().display(), error = %e, "unreadable path skipped"),
        }
    }
    files.sort();
    Ok(files)
}

/// Input-relative, `/`-separated identifier for `file`.
pub fn source_id_for(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

enum Processed {
    Written {
        record: Box<doctidy_markdown::OutputRecord>,
        meta: DocumentMeta,
        size: usize,
    },
    Skipped(doctidy_markdown::SkipReason),
}

fn process_document(
    pipeline: &Pipeline,
    config: &BatchConfig,
    file: &Path,
    source_id: &str,
    paths: &mut PathRegistry,
) -> Result<Processed> {
    let bytes = std::fs::read(file).map_err(|e| DocTidyError::io(file, e))?;
    let size = bytes.len();
    let raw_text = String::from_utf8(bytes)
        .map_err(|_| DocTidyError::parse(format!("{source_id} is not valid UTF-8 text")))?;

    match pipeline.normalize(&RawDocument::new(source_id, raw_text))? {
        Outcome::Assembled(record) => {
            let meta = assembler::assemble_document(&config.output_dir, &record, &config.output, paths)?;
            Ok(Processed::Written {
                record: Box::new(record),
                meta,
                size,
            })
        }
        Outcome::Skipped(reason) => Ok(Processed::Skipped(reason)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
