//! # ghpc: blueprint expansion CLI
//!
//! Loads an HPC blueprint and a module catalog, resolves the blueprint and
//! prints the result for the deployment generator.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
