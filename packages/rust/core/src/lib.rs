//! Batch orchestration for doctidy.
//!
//! This crate walks a scraped documentation tree, runs every page through the
//! normalization pipeline, and assembles the knowledge base (documents,
//! `toc.json`, `manifest.json`, reports) via [`run_batch`].

pub mod accumulator;
pub mod assembler;
pub mod backup;
pub mod pipeline;
pub mod report;
pub mod toc;

pub use accumulator::{CodeExample, LogEntry, LogStatus, RunAccumulator};
pub use pipeline::{BatchConfig, BatchResult, ProgressReporter, SilentProgress, run_batch};
