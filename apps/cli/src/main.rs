//! contentgen CLI: turn structured product data into validated content pages.
//!
//! Runs the content pipeline for one product (optionally compared with a
//! second), or a batch of products through the job manager, and writes the
//! resulting pages as JSON artifacts.

mod commands;
mod input;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
