//! Shared types, error model, and configuration for doctidy.
//!
//! This crate is the foundation depended on by all other doctidy crates.
//! It provides:
//! - [`DocTidyError`], the unified error type
//! - Domain types ([`RawDocument`], [`CodeBlock`], [`Difficulty`], [`RunManifest`], [`Toc`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CategoryConfig, CategoryRule, CodeConfig, DateStrategy, DefaultsConfig,
    DifficultyConfig, KeywordCategory, OutputConfig, PipelineConfig, RecordConfig, SanitizeConfig,
    TagConfig, TagRule, TitleConfig, TitleOverride, TitlePrefixRule, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{DocTidyError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CodeBlock, Difficulty, DocumentMeta, RawDocument, RunId, RunManifest,
    Toc, TocEntry, file_stem,
};
