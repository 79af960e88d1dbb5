//! Application configuration for doctidy.
//!
//! User config lives at `~/.doctidy/doctidy.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Every heuristic table the pipeline consults (title overrides, category
//! precedence, tag keywords, difficulty indicators, known languages) is data
//! in [`PipelineConfig`], so adding a rule never adds control flow.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocTidyError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "doctidy.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".doctidy";

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directories and run toggles.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Rule tables and thresholds for the normalization pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Output layout.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root of the scraped markdown tree.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Knowledge-base output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Where existing output is copied before a run.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Whether to back up an existing output directory.
    #[serde(default = "default_true")]
    pub backup: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            backup_dir: default_backup_dir(),
            backup: true,
        }
    }
}

fn default_input_dir() -> String {
    "raw-docs".into()
}
fn default_output_dir() -> String {
    "knowledge-base".into()
}
fn default_backup_dir() -> String {
    "knowledge-base-backups".into()
}
fn default_true() -> bool {
    true
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Top-level sections in display order; drives directory ordinals and the README.
    pub section_order: Vec<String>,
    /// Prefix section directories with their two-digit ordinal (`01-getting-started`).
    pub numbered_sections: bool,
    /// Maximum code examples collected into `EXAMPLES_INDEX.md`.
    pub max_examples: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            section_order: strings(&[
                "getting-started",
                "core-concepts",
                "data-operations",
                "integrations",
                "advanced-features",
                "best-practices",
                "troubleshooting",
                "reference",
            ]),
            numbered_sections: true,
            max_examples: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline config
// ---------------------------------------------------------------------------

/// `[pipeline]` section: the static configuration surface of the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sanitize: SanitizeConfig,
    pub titles: TitleConfig,
    pub categories: CategoryConfig,
    pub tags: TagConfig,
    pub difficulty: DifficultyConfig,
    pub code: CodeConfig,
    pub record: RecordConfig,
}

/// `[pipeline.sanitize]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Cleaned content shorter than this (in chars) is skipped.
    pub min_content_length: usize,
    /// The first retained line must be longer than this (in chars).
    pub lead_min_line_length: usize,
    /// Lines mentioning these tokens never start the retained content.
    pub boilerplate_tokens: Vec<String>,
    /// Source identifiers containing these are not documentation.
    pub excluded_sources: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            min_content_length: 30,
            lead_min_line_length: 20,
            boilerplate_tokens: strings(&["gitbook", "navigation"]),
            excluded_sources: strings(&["gitbook", "fontawesome", "static", "cache"]),
        }
    }
}

/// Exact override: a stem containing `pattern` gets `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleOverride {
    pub pattern: String,
    pub title: String,
}

/// Filename-derived title prefixing, e.g. `api-keys` -> `API: Keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePrefixRule {
    /// Substring of the stem that activates the rule.
    pub trigger: String,
    /// Label placed before the colon.
    pub prefix: String,
    /// Words containing any of these are dropped from the remainder.
    pub strip: Vec<String>,
    /// Title used when nothing remains after stripping.
    pub bare: String,
    /// Fixed titles for stems that also contain `pattern`, checked first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<TitleOverride>,
}

/// `[pipeline.titles]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub special_cases: Vec<TitleOverride>,
    pub prefix_rules: Vec<TitlePrefixRule>,
    /// Headings must be longer than this (in chars) to be used as a title.
    pub min_heading_length: usize,
    /// Used when the identifier yields no words at all.
    pub fallback: String,
}

impl Default for TitleConfig {
    fn default() -> Self {
        let special = |pattern: &str, title: &str| TitleOverride {
            pattern: pattern.into(),
            title: title.into(),
        };
        let prefix = |trigger: &str, prefix: &str, bare: &str| TitlePrefixRule {
            trigger: trigger.into(),
            prefix: prefix.into(),
            strip: strings(&[trigger]),
            bare: bare.into(),
            cases: Vec::new(),
        };

        Self {
            special_cases: vec![
                special("add-record", "Add Record"),
                special("edit-record", "Edit Record"),
                special("delete-record", "Delete Record"),
                special("query-all", "Query All Records"),
                special("get-record", "Get Record"),
            ],
            prefix_rules: vec![
                TitlePrefixRule {
                    cases: vec![
                        special("request", "API Request"),
                        special("endpoint", "API Endpoints"),
                    ],
                    ..prefix("api", "API", "API Documentation")
                },
                prefix("function", "Function", "Functions"),
                prefix("database", "Database", "Database"),
                prefix("auth", "Authentication", "Authentication"),
            ],
            min_heading_length: 10,
            fallback: "Untitled".into(),
        }
    }
}

/// One row of the category decision table.
///
/// Matches when every `all` token and (if non-empty) at least one `any`
/// token occur in the lower-cased source identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<String>,
}

/// Last-resort keyword for documents no path rule claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCategory {
    pub keyword: String,
    pub category: String,
}

/// `[pipeline.categories]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Evaluated top to bottom; the first match wins.
    pub rules: Vec<CategoryRule>,
    /// Checked against the identifier, then the content.
    pub content_fallbacks: Vec<KeywordCategory>,
    pub default_category: String,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        let rule = |category: &str, all: &[&str], any: &[&str]| CategoryRule {
            category: category.into(),
            all: strings(all),
            any: strings(any),
        };
        let crud = [
            "add-record",
            "edit-record",
            "delete-record",
            "query-all",
            "get-record",
        ];

        Self {
            rules: vec![
                rule("getting-started", &[], &["before-you-begin", "getting-started"]),
                rule("data-operations", &[], &["database-requests"]),
                rule("integrations/ai-services", &[], &["ai-tools", "/ai/"]),
                rule("data-operations", &["function-stack", "database"], &[]),
                rule("core-concepts/api-endpoints", &["function-stack", "api"], &[]),
                rule("core-concepts/function-stack", &["function-stack"], &[]),
                rule("data-operations", &["database"], &crud),
                rule("core-concepts/database", &[], &["the-database", "database"]),
                rule(
                    "advanced-features/custom-functions",
                    &[],
                    &["building-with-visual", "custom-function"],
                ),
                rule("troubleshooting", &[], &["troubleshoot"]),
                rule("advanced-features/expressions", &[], &["xano-features", "expression"]),
                rule("best-practices", &[], &["testing", "best-practice"]),
            ],
            content_fallbacks: vec![
                KeywordCategory {
                    keyword: "example".into(),
                    category: "reference/examples".into(),
                },
                KeywordCategory {
                    keyword: "filter".into(),
                    category: "reference/filters".into(),
                },
            ],
            default_category: "reference/functions".into(),
        }
    }
}

/// A tag label emitted when any of its keywords occurs in the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

/// `[pipeline.tags]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Output order follows table order.
    pub rules: Vec<TagRule>,
    pub max_tags: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        let tag = |keyword: &str, label: &str| TagRule {
            tag: label.into(),
            keywords: vec![keyword.into()],
        };

        Self {
            rules: vec![
                tag("api", "API"),
                tag("database", "Database"),
                tag("function", "Functions"),
                tag("query", "Queries"),
                tag("crud", "CRUD"),
                tag("auth", "Authentication"),
                tag("webhook", "Webhooks"),
                tag("expression", "Expressions"),
                tag("filter", "Filters"),
                tag("transaction", "Transactions"),
            ],
            max_tags: 5,
        }
    }
}

/// `[pipeline.difficulty]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub advanced: Vec<String>,
    pub intermediate: Vec<String>,
    /// Distinct advanced indicators needed for `advanced`.
    pub advanced_threshold: usize,
    /// Distinct intermediate indicators needed for `intermediate`.
    pub intermediate_threshold: usize,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            advanced: strings(&[
                "transaction",
                "optimization",
                "performance",
                "scaling",
                "custom function",
                "complex",
                "advanced",
                "enterprise",
            ]),
            intermediate: strings(&[
                "filter",
                "expression",
                "webhook",
                "api",
                "integration",
                "authentication",
                "validation",
                "transformation",
            ]),
            advanced_threshold: 2,
            intermediate_threshold: 2,
        }
    }
}

/// `[pipeline.code]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Info strings accepted as declared languages.
    pub known_languages: Vec<String>,
    /// Tag used when sniffing finds nothing better.
    pub default_language: String,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            known_languages: strings(&[
                "javascript", "js", "typescript", "ts", "json", "sql", "python", "py", "php",
                "html", "xml", "css", "bash", "sh", "shell", "yaml", "yml", "text", "plaintext",
                "graphql",
            ]),
            default_language: "javascript".into(),
        }
    }
}

/// How the `last_updated` field is filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum DateStrategy {
    /// The same literal date on every record.
    Fixed { value: String },
    /// The run's start date (`YYYY-MM-DD`), resolved once per run.
    Now,
}

impl Default for DateStrategy {
    fn default() -> Self {
        Self::Fixed {
            value: "2025-01-23".into(),
        }
    }
}

impl DateStrategy {
    /// Parse a CLI value: `now` or a `YYYY-MM-DD` date.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("now") {
            return Ok(Self::Now);
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
            DocTidyError::config(format!("invalid date '{value}': expected now or YYYY-MM-DD ({e})"))
        })?;
        Ok(Self::Fixed {
            value: value.to_string(),
        })
    }

    /// The date string stamped into records of a run started at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Fixed { value } => value.clone(),
            Self::Now => now.format("%Y-%m-%d").to_string(),
        }
    }
}

/// `[pipeline.record]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub date: DateStrategy,
    /// Keywords reported in the `integrations` frontmatter list when present.
    pub integrations: Vec<String>,
    /// Append a `## Code Examples` section listing every block.
    pub code_examples_section: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            date: DateStrategy::default(),
            integrations: strings(&["n8n", "weweb"]),
            code_examples_section: false,
        }
    }
}

impl PipelineConfig {
    /// Reject tables the pipeline cannot evaluate totally.
    pub fn validate(&self) -> Result<()> {
        if self.sanitize.min_content_length == 0 {
            return Err(DocTidyError::validation(
                "sanitize.min_content_length must be at least 1",
            ));
        }
        if self.tags.max_tags == 0 {
            return Err(DocTidyError::validation("tags.max_tags must be at least 1"));
        }
        if self.categories.default_category.trim().is_empty() {
            return Err(DocTidyError::validation(
                "categories.default_category must not be empty",
            ));
        }
        if self.code.default_language.trim().is_empty() {
            return Err(DocTidyError::validation(
                "code.default_language must not be empty",
            ));
        }
        if self.titles.fallback.trim().is_empty() {
            return Err(DocTidyError::validation("titles.fallback must not be empty"));
        }
        for (i, rule) in self.categories.rules.iter().enumerate() {
            if rule.category.trim().is_empty() {
                return Err(DocTidyError::validation(format!(
                    "categories.rules[{i}] has an empty category"
                )));
            }
            if rule.all.is_empty() && rule.any.is_empty() {
                return Err(DocTidyError::validation(format!(
                    "categories.rules[{i}] ({}) has no tokens",
                    rule.category
                )));
            }
        }
        for (i, rule) in self.tags.rules.iter().enumerate() {
            if rule.tag.trim().is_empty() || rule.keywords.is_empty() {
                return Err(DocTidyError::validation(format!(
                    "tags.rules[{i}] needs a tag and at least one keyword"
                )));
            }
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.doctidy/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocTidyError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.doctidy/doctidy.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocTidyError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocTidyError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.pipeline.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocTidyError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocTidyError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocTidyError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("min_content_length"));
        assert!(toml_str.contains("query-all"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.sanitize.min_content_length, 30);
        assert_eq!(parsed.pipeline.tags.max_tags, 5);
        assert_eq!(parsed.pipeline.categories.rules, config.pipeline.categories.rules);
        assert_eq!(parsed.pipeline.record.date, DateStrategy::default());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[defaults]
input_dir = "/srv/scrape/markdown"

[pipeline.sanitize]
min_content_length = 100

[pipeline.record.date]
strategy = "now"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.input_dir, "/srv/scrape/markdown");
        assert_eq!(config.defaults.output_dir, "knowledge-base");
        assert_eq!(config.pipeline.sanitize.min_content_length, 100);
        assert_eq!(config.pipeline.sanitize.lead_min_line_length, 20);
        assert_eq!(config.pipeline.record.date, DateStrategy::Now);
        assert_eq!(config.pipeline.titles.special_cases.len(), 5);
    }

    #[test]
    fn custom_category_table_replaces_default() {
        let toml_str = r#"
[pipeline.categories]
default_category = "misc"

[[pipeline.categories.rules]]
category = "guides"
any = ["guide"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.categories.rules.len(), 1);
        assert!(config.pipeline.categories.rules[0].all.is_empty());
        assert_eq!(config.pipeline.categories.default_category, "misc");
        assert!(config.pipeline.validate().is_ok());
    }

    #[test]
    fn default_pipeline_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_tokenless_category_rule() {
        let mut config = PipelineConfig::default();
        config.categories.rules.push(CategoryRule {
            category: "orphans".into(),
            all: vec![],
            any: vec![],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("orphans"));
    }

    #[test]
    fn validate_rejects_zero_tag_cap() {
        let mut config = PipelineConfig::default();
        config.tags.max_tags = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn date_strategy_parse_and_resolve() {
        let now = DateTime::parse_from_rfc3339("2026-03-04T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);

        assert_eq!(DateStrategy::parse("now").unwrap(), DateStrategy::Now);
        assert_eq!(DateStrategy::Now.resolve(now), "2026-03-04");

        let fixed = DateStrategy::parse("2025-01-23").unwrap();
        assert_eq!(fixed.resolve(now), "2025-01-23");

        assert!(DateStrategy::parse("yesterday").is_err());
        assert!(DateStrategy::parse("2025-13-01").is_err());
    }
}
