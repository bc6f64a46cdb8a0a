//! Intergroup references: module outputs consumed by later groups.
//!
//! Every output crossing a group boundary is carried between deployment
//! stages under its automatic name, see [`automatic_output_name`].

use std::collections::{BTreeMap, BTreeSet};

use ghpc_common::constants::GENERATED_OUTPUT_DESCRIPTION;
use ghpc_common::error::Result;
use ghpc_common::types::{GroupName, ModuleId};

use crate::blueprint::{Blueprint, Group, Module};
use crate::module_info::OutputInfo;
use crate::reference::Reference;
use crate::value::Value;

/// Name under which output `name` of `module` crosses group boundaries.
#[must_use]
pub fn automatic_output_name(name: &str, module: &ModuleId) -> String {
    format!("{name}_{module}")
}

/// Module references in `value` whose target lives in another group than `owner`.
///
/// References to unknown modules are skipped; validation reports them.
#[must_use]
pub fn find_intergroup_references(bp: &Blueprint, value: &Value, owner: &Module) -> Vec<Reference> {
    let Ok(own_group) = bp.module_group_index(&owner.id) else {
        return Vec::new();
    };
    value
        .references()
        .into_iter()
        .filter(|r| !r.is_global)
        .filter(|r| bp.module_group_index(&r.module_id()).is_ok_and(|g| g != own_group))
        .collect()
}

/// Distinct intergroup references made by the modules of `group`.
#[must_use]
pub fn group_intergroup_references(bp: &Blueprint, group: &Group) -> BTreeSet<Reference> {
    group
        .modules
        .iter()
        .flat_map(|m| find_intergroup_references(bp, &m.settings.as_object(), m))
        .collect()
}

/// Declares every output referenced from another group.
///
/// Outputs the user did not declare are added as sensitive outputs with a
/// generated description.
///
/// # Errors
///
/// Never fails for a validated blueprint; kept fallible for the tree walk.
pub fn populate_outputs(bp: &mut Blueprint) -> Result<()> {
    tracing::info!("populating intergroup outputs");
    let refs: BTreeSet<Reference> = bp
        .groups
        .iter()
        .flat_map(|g| group_intergroup_references(bp, g))
        .collect();
    bp.walk_modules_mut(|_, module| {
        for r in refs.iter().filter(|r| r.module.as_ref() == Some(&module.id)) {
            if module.has_output(&r.name) {
                continue;
            }
            tracing::debug!(module = %module.id, output = %r.name, "adding intergroup output");
            module.outputs.push(OutputInfo {
                name: r.name.clone(),
                description: Some(format!("{GENERATED_OUTPUT_DESCRIPTION} '{}'", module.id)),
                sensitive: true,
            });
        }
        Ok(())
    })
}

impl Group {
    /// Automatic names of every output declared by the group's modules.
    #[must_use]
    pub fn output_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|m| m.outputs.iter().map(|o| automatic_output_name(&o.name, &m.id)))
            .collect()
    }
}

/// For `group`, the automatic output names it needs from each earlier group.
///
/// Each producing group maps to the sorted intersection of its automatic
/// output names with the names required by `group`'s intergroup references.
///
/// # Errors
///
/// Returns an error if `group` does not exist.
pub fn output_names_by_group(bp: &Blueprint, group: &GroupName) -> Result<BTreeMap<GroupName, Vec<String>>> {
    let target = bp.group(group)?;
    let refs = group_intergroup_references(bp, target);
    let needed: BTreeSet<String> = refs
        .iter()
        .map(|r| automatic_output_name(&r.name, &r.module_id()))
        .collect();
    let mut out = BTreeMap::new();
    for r in &refs {
        let producer = bp.module_group(&r.module_id())?;
        if out.contains_key(&producer.name) {
            continue;
        }
        let mut names: Vec<String> = producer
            .output_names()
            .into_iter()
            .filter(|n| needed.contains(n))
            .collect();
        names.sort();
        names.dedup();
        let _ = out.insert(producer.name.clone(), names);
    }
    Ok(out)
}
