//! The expansion pipeline: from a loaded blueprint to a resolved one.
//!
//! Passes run in a fixed order; each one assumes the invariants
//! established by the previous ones:
//!
//! 1. options (validation level, command-line variables)
//! 2. default module kinds
//! 3. structural validation
//! 4. reference validation
//! 5. labels and backends
//! 6. global variable evaluation, with `ghpc_stage` recorded
//! 7. `use` propagation and global variable wiring
//! 8. intergroup outputs and group order
//! 9. staging inside module settings, backend materialization

use std::collections::BTreeMap;

use ghpc_common::config::ExpandOptions;
use ghpc_common::error::Result;
use ghpc_common::path::Path;
use ghpc_common::types::{GroupName, ModuleId, ModuleKind};
use serde::Serialize;

use crate::backends::{expand_backends, materialize_backends};
use crate::blueprint::Blueprint;
use crate::expression::eval::EvalContext;
use crate::graph::GroupGraph;
use crate::igc::{output_names_by_group, populate_outputs};
use crate::labels::combine_labels;
use crate::module_info::ModuleInfoSource;
use crate::staging::stage_value;
use crate::use_modules::{apply_global_variables, apply_use_modules};
use crate::validate::{validate_module_references, validate_structure};
use crate::vars::evaluate_vars_with_staging;

/// Applies caller options to `bp`.
///
/// # Errors
///
/// Returns an error for malformed command-line variables.
pub fn apply_options(bp: &mut Blueprint, opts: &ExpandOptions) -> Result<()> {
    if let Some(level) = opts.validation_level {
        tracing::debug!(%level, "overriding validation level");
        bp.validation_level = level;
    }
    bp.set_cli_variables(&opts.cli_variables)
}

/// Modules without an explicit kind are Terraform modules.
pub fn default_module_kinds(bp: &mut Blueprint) {
    for module in bp.groups.iter_mut().flat_map(|g| g.modules.iter_mut()) {
        if module.kind == ModuleKind::Unknown {
            module.kind = ModuleKind::Terraform;
        }
    }
}

/// Resolves `ghpc_stage` calls in every module setting.
///
/// Must run after global variables are evaluated.
///
/// # Errors
///
/// Returns the first staging error, located at the setting.
pub fn stage_module_settings(bp: &mut Blueprint) -> Result<()> {
    let vars = bp.vars.items();
    let dir = bp.blueprint_dir().to_path_buf();
    let mut ctx = EvalContext::new(&vars).with_staging(&dir, &mut bp.staged_files);
    for (ig, group) in bp.groups.iter_mut().enumerate() {
        for (im, module) in group.modules.iter_mut().enumerate() {
            let settings = Path::root().groups().at(ig).modules().at(im).settings();
            module
                .settings
                .try_map_values(|key, value| stage_value(value, &mut ctx).map_err(|e| e.at(settings.dot(key))))?;
        }
    }
    Ok(())
}

/// Runs the whole pipeline on `bp`.
///
/// On success `bp` holds evaluated global variables, module settings that
/// only reference module outputs and global variables, the outputs needed
/// across groups, materialized backends and the staged-file table.
///
/// # Errors
///
/// Returns the first failing pass's error. Validation passes report every
/// problem they find at once.
pub fn expand(bp: &mut Blueprint, catalog: &dyn ModuleInfoSource, opts: &ExpandOptions) -> Result<()> {
    tracing::info!(blueprint = %bp.blueprint_name, "expanding blueprint");
    apply_options(bp, opts)?;
    default_module_kinds(bp);

    validate_structure(bp, catalog)?;
    validate_module_references(bp, catalog)?;

    combine_labels(bp, catalog)?;
    expand_backends(bp);

    tracing::info!("evaluating global variables");
    let dir = bp.blueprint_dir().to_path_buf();
    bp.vars = evaluate_vars_with_staging(&bp.vars, &dir, &mut bp.staged_files)?;
    let deployment = bp.deployment_name()?;
    tracing::debug!(deployment, "deployment name resolved");

    apply_use_modules(bp, catalog)?;
    apply_global_variables(bp, catalog)?;

    populate_outputs(bp)?;
    GroupGraph::from_blueprint(bp)?.check_declared_order(bp)?;

    tracing::info!("staging files");
    stage_module_settings(bp)?;
    materialize_backends(bp)?;
    tracing::info!(
        groups = bp.groups.len(),
        staged = bp.staged_files.len(),
        "blueprint expanded"
    );
    Ok(())
}

/// One deployment group of a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlan {
    /// Group name.
    pub name: GroupName,
    /// Homogeneous kind of the group's modules.
    pub kind: ModuleKind,
    /// Module IDs in declaration order.
    pub modules: Vec<ModuleId>,
    /// Automatic output names consumed from each earlier group.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<GroupName, Vec<String>>,
}

/// Summary of an expanded blueprint for the code generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Blueprint name.
    pub blueprint: String,
    /// Deployment name.
    pub deployment: String,
    /// Groups in declaration order, which is also the deployment order.
    pub groups: Vec<GroupPlan>,
    /// Staged files, source to destination.
    pub staged_files: BTreeMap<String, String>,
}

impl Plan {
    /// Builds the plan of an expanded blueprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint has no deployment name, or if its
    /// groups depend on each other cyclically or out of declaration order.
    pub fn from_blueprint(bp: &Blueprint) -> Result<Self> {
        let graph = GroupGraph::from_blueprint(bp)?;
        let _ = graph.deployment_order()?;
        graph.check_declared_order(bp)?;
        let mut groups = Vec::with_capacity(bp.groups.len());
        for group in &bp.groups {
            groups.push(GroupPlan {
                name: group.name.clone(),
                kind: group.kind(),
                modules: group.modules.iter().map(|m| m.id.clone()).collect(),
                inputs: output_names_by_group(bp, &group.name)?,
            });
        }
        Ok(Self {
            blueprint: bp.blueprint_name.clone(),
            deployment: bp.deployment_name()?,
            groups,
            staged_files: bp
                .staged_files
                .iter()
                .map(|(src, dst)| (src.to_owned(), dst.to_owned()))
                .collect(),
        })
    }
}
