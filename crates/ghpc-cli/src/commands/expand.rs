//! `ghpc expand`: Resolve a blueprint and write the expanded document.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use super::BlueprintArgs;
use crate::output;

/// Serialization of the expanded blueprint.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// YAML, with expressions written as `((...))`.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Arguments for the `expand` command.
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Blueprint, catalog and overrides.
    #[command(flatten)]
    pub common: BlueprintArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    pub format: Format,

    /// Write the result to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Executes the `expand` command.
///
/// # Errors
///
/// Returns an error if loading, expansion or writing the result fails.
pub fn execute(args: &ExpandArgs) -> anyhow::Result<()> {
    let bp = args.common.load_and_expand()?;
    let text = match args.format {
        Format::Yaml => ghpc_config::yaml::to_yaml(&bp)?,
        Format::Json => ghpc_config::yaml::to_json(&bp)?,
    };
    output::emit(&text, args.out.as_deref())?;
    tracing::info!(blueprint = %bp.blueprint_name, "expanded blueprint written");
    Ok(())
}
