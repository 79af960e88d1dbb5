//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use doctidy_core::assembler::validate_output;
use doctidy_core::{BatchConfig, BatchResult, ProgressReporter, run_batch};
use doctidy_markdown::{Outcome, Pipeline};
use doctidy_shared::{
    AppConfig, DateStrategy, RawDocument, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// doctidy: clean, classify and index scraped documentation.
#[derive(Parser)]
#[command(
    name = "doctidy",
    version,
    about = "Normalize scraped documentation into an organized markdown knowledge base.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to load instead of ~/.doctidy/doctidy.toml.
    #[arg(long, global = true, env = "DOCTIDY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Normalize every markdown file under the input directory.
    Run {
        /// Root of the scraped markdown tree.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Knowledge-base output directory.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Where an existing output directory is backed up.
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Skip backing up an existing output directory.
        #[arg(long)]
        no_backup: bool,

        /// Minimum cleaned content length (characters).
        #[arg(long)]
        min_length: Option<usize>,

        /// Date stamped into `last_updated`: `now` or YYYY-MM-DD.
        #[arg(long)]
        date: Option<String>,
    },

    /// Run the pipeline on one file and print the result.
    Inspect {
        /// Markdown file to normalize.
        file: PathBuf,

        /// Source identifier used for classification (defaults to the file path).
        #[arg(long)]
        source_id: Option<String>,
    },

    /// Check an output directory against its manifest.
    Verify {
        /// Knowledge-base directory (defaults to the configured output directory).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "doctidy=info",
        1 => "doctidy=debug",
        _ => "doctidy=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            input,
            out,
            backup_dir,
            no_backup,
            min_length,
            date,
        } => cmd_run(
            resolve_config(config_path)?,
            RunOverrides {
                input,
                out,
                backup_dir,
                no_backup,
                min_length,
                date,
            },
        ),
        Command::Inspect { file, source_id } => {
            cmd_inspect(&resolve_config(config_path)?, &file, source_id.as_deref())
        }
        Command::Verify { out } => cmd_verify(&resolve_config(config_path)?, out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config_from(path)
            .wrap_err_with(|| format!("loading config from {}", path.display())),
        None => Ok(load_config()?),
    }
}

/// Flags of `doctidy run` that override the loaded config.
struct RunOverrides {
    input: Option<PathBuf>,
    out: Option<PathBuf>,
    backup_dir: Option<PathBuf>,
    no_backup: bool,
    min_length: Option<usize>,
    date: Option<String>,
}

impl RunOverrides {
    fn apply(self, config: &mut AppConfig) -> Result<()> {
        if let Some(input) = self.input {
            config.defaults.input_dir = input.to_string_lossy().into_owned();
        }
        if let Some(out) = self.out {
            config.defaults.output_dir = out.to_string_lossy().into_owned();
        }
        if let Some(backup_dir) = self.backup_dir {
            config.defaults.backup_dir = backup_dir.to_string_lossy().into_owned();
        }
        if self.no_backup {
            config.defaults.backup = false;
        }
        if let Some(min_length) = self.min_length {
            config.pipeline.sanitize.min_content_length = min_length;
        }
        if let Some(date) = self.date {
            config.pipeline.record.date = DateStrategy::parse(&date)?;
        }
        config.pipeline.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_run(mut config: AppConfig, overrides: RunOverrides) -> Result<()> {
    overrides.apply(&mut config)?;
    let batch = BatchConfig::from_app_config(&config, env!("CARGO_PKG_VERSION"));

    info!(
        input = %batch.input_dir.display(),
        output = %batch.output_dir.display(),
        backup = batch.backup_dir.is_some(),
        "normalizing documentation"
    );

    let reporter = CliProgress::new();
    let result = run_batch(&batch, &reporter)?;

    println!();
    println!("  Knowledge base written!");
    println!("  Processed: {}", result.processed());
    println!("  Skipped:   {}", result.skipped());
    println!("  Errors:    {}", result.errors());
    println!("  Examples:  {}", result.accumulator.code_example_count());
    println!("  Path:      {}", result.output_dir.display());
    if let Some(backup) = &result.backup_path {
        println!("  Backup:    {}", backup.display());
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_inspect(config: &AppConfig, file: &Path, source_id: Option<&str>) -> Result<()> {
    let raw_text = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("reading {}", file.display()))?;
    let source_id = source_id
        .map(str::to_string)
        .unwrap_or_else(|| file.to_string_lossy().replace('\\', "/"));

    let date = config.pipeline.record.date.resolve(Utc::now());
    let pipeline = Pipeline::new(&config.pipeline, date)?;

    match pipeline.normalize(&RawDocument::new(source_id, raw_text))? {
        Outcome::Assembled(record) => print!("{}", record.render()?),
        Outcome::Skipped(reason) => println!("skipped: {reason}"),
    }
    Ok(())
}

fn cmd_verify(config: &AppConfig, out: Option<PathBuf>) -> Result<()> {
    let dir = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    if !dir.is_dir() {
        return Err(eyre!("no knowledge base at '{}'", dir.display()));
    }
    let manifest = validate_output(&dir)?;
    println!(
        "{}: {} documents verified (run {}, {})",
        dir.display(),
        manifest.documents.len(),
        manifest.run_id,
        manifest.record_date
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_processed(&self, source_id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Normalizing [{current}/{total}] {source_id}"));
    }

    fn done(&self, _result: &BatchResult) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "doctidy",
            "run",
            "--input",
            "raw",
            "--no-backup",
            "--min-length",
            "50",
            "--date",
            "now",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Run {
            input,
            no_backup,
            min_length,
            date,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(input, Some(PathBuf::from("raw")));
        assert!(no_backup);
        assert_eq!(min_length, Some(50));
        assert_eq!(date.as_deref(), Some("now"));
    }

    #[test]
    fn overrides_apply_to_config() {
        let mut config = AppConfig::default();
        RunOverrides {
            input: Some("docs/raw".into()),
            out: Some("kb".into()),
            backup_dir: None,
            no_backup: true,
            min_length: Some(80),
            date: Some("2024-12-01".into()),
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.defaults.input_dir, "docs/raw");
        assert_eq!(config.defaults.output_dir, "kb");
        assert!(!config.defaults.backup);
        assert_eq!(config.pipeline.sanitize.min_content_length, 80);
        assert_eq!(
            config.pipeline.record.date,
            DateStrategy::Fixed {
                value: "2024-12-01".into()
            }
        );
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let mut config = AppConfig::default();
        let bad_date = RunOverrides {
            input: None,
            out: None,
            backup_dir: None,
            no_backup: false,
            min_length: None,
            date: Some("yesterday".into()),
        };
        assert!(bad_date.apply(&mut config).is_err());

        let zero_length = RunOverrides {
            input: None,
            out: None,
            backup_dir: None,
            no_backup: false,
            min_length: Some(0),
            date: None,
        };
        assert!(zero_length.apply(&mut config).is_err());
    }
}
