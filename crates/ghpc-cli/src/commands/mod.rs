//! CLI command definitions and dispatch.

pub mod expand;
pub mod plan;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ghpc_common::config::{ExpandOptions, ValidationLevel};
use ghpc_config::{Blueprint, ModuleCatalog};

/// ghpc: HPC blueprint expansion.
#[derive(Parser, Debug)]
#[command(name = "ghpc", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a blueprint and write the expanded document.
    Expand(expand::ExpandArgs),
    /// Resolve a blueprint and display its deployment plan.
    Plan(plan::PlanArgs),
}

/// Inputs shared by every command that runs the pipeline.
#[derive(Args, Debug)]
pub struct BlueprintArgs {
    /// Path to the blueprint YAML file.
    pub blueprint: PathBuf,

    /// Path to the module catalog YAML file.
    #[arg(long, short = 'm', env = "GHPC_MODULES")]
    pub modules: PathBuf,

    /// Override a global variable, as `name=value`.
    #[arg(long = "vars", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Override the blueprint's validation level.
    #[arg(long, value_parser = parse_validation_level)]
    pub validation_level: Option<ValidationLevel>,
}

fn parse_validation_level(s: &str) -> Result<ValidationLevel, String> {
    s.to_uppercase().parse().map_err(|e: ghpc_common::error::BlueprintError| e.to_string())
}

impl BlueprintArgs {
    /// Loads the blueprint and catalog, then runs the expansion pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be loaded or expansion fails.
    pub fn load_and_expand(&self) -> anyhow::Result<Blueprint> {
        let catalog = ModuleCatalog::load(&self.modules)
            .with_context(|| format!("loading module catalog {}", self.modules.display()))?;
        let mut bp = ghpc_config::yaml::load_blueprint(&self.blueprint)
            .with_context(|| format!("loading blueprint {}", self.blueprint.display()))?;
        let opts = ExpandOptions {
            validation_level: self.validation_level,
            cli_variables: self.vars.clone(),
        };
        ghpc_config::expand(&mut bp, &catalog, &opts)?;
        Ok(bp)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Expand(args) => expand::execute(&args),
        Command::Plan(args) => plan::execute(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expand_with_overrides() {
        let cli = Cli::try_parse_from([
            "ghpc",
            "expand",
            "bp.yaml",
            "--modules",
            "modules.yaml",
            "--vars",
            "region=us-east1",
            "--vars",
            "count=3",
            "--validation-level",
            "warning",
        ])
        .expect("should parse");
        let Command::Expand(args) = cli.command else {
            panic!("expected expand");
        };
        assert_eq!(args.common.vars, ["region=us-east1", "count=3"]);
        assert_eq!(args.common.validation_level, Some(ValidationLevel::Warning));
    }

    #[test]
    fn rejects_unknown_validation_level() {
        let err = Cli::try_parse_from([
            "ghpc",
            "plan",
            "bp.yaml",
            "-m",
            "modules.yaml",
            "--validation-level",
            "loud",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("invalid validation level"), "got: {err}");
    }
}
