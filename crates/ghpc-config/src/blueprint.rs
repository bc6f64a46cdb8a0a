//! The blueprint data model.
//!
//! A [`Blueprint`] is loaded once, then transformed in place by the passes
//! of [`crate::expand`]. After expansion it is read-only input for code
//! generation and for the validator layer, which use [`Blueprint::eval`]
//! and [`Blueprint::walk_modules`].

use std::collections::BTreeMap;
use std::path::{Path as FsPath, PathBuf};

use ghpc_common::config::ValidationLevel;
use ghpc_common::constants::DEPLOYMENT_NAME_VAR;
use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::path::{ModulePath, Path};
use ghpc_common::types::{GroupName, ModuleId, ModuleKind};
use serde::{Deserialize, Serialize};

use crate::dict::Dict;
use crate::expression::eval::{EvalContext, eval_value};
use crate::module_info::OutputInfo;
use crate::staging::StagedFiles;
use crate::value::Value;

/// Terraform state backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    /// Backend type, e.g. `gcs`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Backend settings.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub configuration: Dict,
}

impl Backend {
    /// Returns `true` when neither type nor configuration is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.configuration.is_empty()
    }
}

/// A validator invocation, run by the external validator layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validator {
    /// Validator name.
    pub validator: String,
    /// Skip this validator.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
    /// Validator inputs.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub inputs: Dict,
}

/// One infrastructure module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Module {
    /// Module source.
    pub source: String,
    /// Deployment tool; defaulted to Terraform during expansion.
    #[serde(default)]
    pub kind: ModuleKind,
    /// Identifier, unique across the blueprint.
    pub id: ModuleId,
    /// Modules whose outputs feed this module's unset inputs.
    #[serde(rename = "use", default, skip_serializing_if = "Vec::is_empty")]
    pub use_: Vec<ModuleId>,
    /// Declared outputs; extended with intergroup outputs during expansion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputInfo>,
    /// Input values.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub settings: Dict,
}

impl Module {
    /// Module `id` built from `source`, with no settings.
    #[must_use]
    pub fn new(id: impl Into<ModuleId>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if output `name` is declared.
    #[must_use]
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }
}

/// An ordered deployment stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    /// Group name.
    #[serde(rename = "group")]
    pub name: GroupName,
    /// Backend override; inherits the blueprint default when absent.
    #[serde(rename = "terraform_backend", default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    /// Modules of the group.
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Group {
    /// Shared kind of the modules, or [`ModuleKind::Unknown`] when they differ or there are none.
    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        let mut kinds = self.modules.iter().map(|m| m.kind);
        match kinds.next() {
            Some(first) if kinds.all(|k| k == first) => first,
            _ => ModuleKind::Unknown,
        }
    }

    /// Module `id`, if it belongs to this group.
    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| &m.id == id)
    }
}

/// The root of a blueprint document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blueprint {
    /// Blueprint name.
    pub blueprint_name: String,
    /// Source file; relative `ghpc_stage` paths resolve against its directory.
    #[serde(skip)]
    pub path: PathBuf,
    /// Validators for the external validator layer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    /// How validator failures are treated.
    #[serde(default)]
    pub validation_level: ValidationLevel,
    /// Global variables.
    #[serde(default)]
    pub vars: Dict,
    /// Deployment groups in deployment order.
    #[serde(rename = "deployment_groups", default)]
    pub groups: Vec<Group>,
    /// Backend for groups without an override.
    #[serde(
        rename = "terraform_backend_defaults",
        default,
        skip_serializing_if = "Backend::is_empty"
    )]
    pub backend_defaults: Backend,
    /// Files to copy next to the deployment, by absolute source path.
    #[serde(skip_deserializing, skip_serializing_if = "StagedFiles::is_empty")]
    pub staged_files: StagedFiles,
}

impl Blueprint {
    /// Directory containing the blueprint source.
    #[must_use]
    pub fn blueprint_dir(&self) -> &FsPath {
        self.path.parent().unwrap_or_else(|| FsPath::new(""))
    }

    /// Module `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::UnknownModule`] if no module has that ID.
    pub fn module(&self, id: &ModuleId) -> Result<&Module> {
        self.groups
            .iter()
            .find_map(|g| g.module(id))
            .ok_or_else(|| BlueprintError::UnknownModule { id: id.clone() })
    }

    /// Index of the group containing module `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::UnknownModule`] if no module has that ID.
    pub fn module_group_index(&self, id: &ModuleId) -> Result<usize> {
        self.groups
            .iter()
            .position(|g| g.module(id).is_some())
            .ok_or_else(|| BlueprintError::UnknownModule { id: id.clone() })
    }

    /// Group containing module `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::UnknownModule`] if no module has that ID.
    pub fn module_group(&self, id: &ModuleId) -> Result<&Group> {
        let index = self.module_group_index(id)?;
        Ok(&self.groups[index])
    }

    /// Group `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::UnknownGroup`] if no group has that name.
    pub fn group(&self, name: &GroupName) -> Result<&Group> {
        self.groups
            .iter()
            .find(|g| &g.name == name)
            .ok_or_else(|| BlueprintError::UnknownGroup {
                name: name.to_string(),
            })
    }

    /// IDs of all modules in declaration order.
    #[must_use]
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.groups
            .iter()
            .flat_map(|g| g.modules.iter().map(|m| m.id.clone()))
            .collect()
    }

    /// Calls `f` on every module with its location, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first error of `f`.
    pub fn walk_modules(&self, mut f: impl FnMut(ModulePath, &Module) -> Result<()>) -> Result<()> {
        for (ig, group) in self.groups.iter().enumerate() {
            for (im, module) in group.modules.iter().enumerate() {
                f(Path::root().groups().at(ig).modules().at(im), module)?;
            }
        }
        Ok(())
    }

    /// Mutable form of [`Blueprint::walk_modules`].
    ///
    /// # Errors
    ///
    /// Propagates the first error of `f`.
    pub fn walk_modules_mut(
        &mut self,
        mut f: impl FnMut(ModulePath, &mut Module) -> Result<()>,
    ) -> Result<()> {
        for (ig, group) in self.groups.iter_mut().enumerate() {
            for (im, module) in group.modules.iter_mut().enumerate() {
                f(Path::root().groups().at(ig).modules().at(im), module)?;
            }
        }
        Ok(())
    }

    /// Evaluates `value` against the global variables.
    ///
    /// Meant for use after variable evaluation, when every global is a
    /// literal.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` references modules or unknown variables.
    pub fn eval(&self, value: &Value) -> Result<Value> {
        let vars = self.vars.items();
        let mut ctx = EvalContext::new(&vars);
        eval_value(value, &mut ctx)
    }

    /// Evaluates every entry of `dict`; see [`Blueprint::eval`].
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error.
    pub fn eval_dict(&self, dict: &Dict) -> Result<Dict> {
        let vars = self.vars.items();
        let mut ctx = EvalContext::new(&vars);
        dict.eval(&mut ctx)
    }

    /// Overrides global variables from `name=value` items.
    ///
    /// Values are read as YAML, so `count=3` sets a number.
    ///
    /// # Errors
    ///
    /// Returns an error for items without `=` or with malformed values.
    pub fn set_cli_variables(&mut self, items: &[String]) -> Result<()> {
        for item in items {
            let (name, raw) = item
                .split_once('=')
                .ok_or_else(|| BlueprintError::CliVariableFormat { item: item.clone() })?;
            let parsed: serde_yaml::Value = serde_yaml::from_str(raw)?;
            let value = Value::from_yaml(parsed)?;
            tracing::debug!(name, "overriding global variable from command line");
            let _ = self.vars.set(name, value);
        }
        Ok(())
    }

    /// The `deployment_name` global variable.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::DeploymentName`] if it is missing, not a
    /// string or empty.
    pub fn deployment_name(&self) -> Result<String> {
        let path = Path::root().vars().dot(DEPLOYMENT_NAME_VAR);
        if !self.vars.has(DEPLOYMENT_NAME_VAR) {
            return Err(BlueprintError::DeploymentName {
                cause: "deployment_name variable not defined.",
            }
            .at(path));
        }
        match self.vars.get(DEPLOYMENT_NAME_VAR) {
            Value::String(s) if s.is_empty() => Err(BlueprintError::DeploymentName {
                cause: "deployment_name was an empty string.",
            }
            .at(path)),
            Value::String(s) => Ok(s),
            _ => Err(BlueprintError::DeploymentName {
                cause: "deployment_name was not of type string.",
            }
            .at(path)),
        }
    }

    /// Module IDs grouped by group name, in declaration order.
    #[must_use]
    pub fn modules_by_group(&self) -> BTreeMap<GroupName, Vec<ModuleId>> {
        self.groups
            .iter()
            .map(|g| (g.name.clone(), g.modules.iter().map(|m| m.id.clone()).collect()))
            .collect()
    }
}
