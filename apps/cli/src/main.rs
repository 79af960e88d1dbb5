//! doctidy CLI: turn scraped documentation into a clean knowledge base.
//!
//! Strips scraping artifacts from markdown pages, classifies them, and
//! writes an organized, indexed knowledge-base directory.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
