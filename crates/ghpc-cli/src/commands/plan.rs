//! `ghpc plan`: Display the deployment plan of a blueprint.

use clap::Args;
use ghpc_config::Plan;

use super::BlueprintArgs;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Blueprint, catalog and overrides.
    #[command(flatten)]
    pub common: BlueprintArgs,

    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// Expands the blueprint, resolves the group deployment order and displays
/// each group with its modules, the outputs it receives from earlier
/// groups and the staged files.
///
/// # Errors
///
/// Returns an error if expansion or order resolution fails.
pub fn execute(args: &PlanArgs) -> anyhow::Result<()> {
    let bp = args.common.load_and_expand()?;
    let plan = Plan::from_blueprint(&bp)?;
    let text = if args.json {
        serde_json::to_string_pretty(&plan)?
    } else {
        output::render_plan(&plan)
    };
    output::emit(&text, None)
}
