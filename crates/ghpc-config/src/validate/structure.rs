//! Structural checks on an unresolved blueprint.
//!
//! Independent problems are accumulated so a user sees all of them at once.

use std::collections::HashSet;
use std::sync::LazyLock;

use ghpc_common::constants::{GLOBAL_NAMESPACE, MOVED_MODULES};
use ghpc_common::error::{BlueprintError, Errors, Result};
use ghpc_common::path::{MapPath, ModulePath, OutputsPath, Path};
use ghpc_common::types::{GroupName, ModuleKind};
use regex::Regex;

use super::closest_match;
use crate::blueprint::{Blueprint, Group, Module};
use crate::literal::{self, is_match};
use crate::module_info::{ModuleInfo, ModuleInfoSource};
use crate::value::Value;

static GROUP_NAME: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\w(-*\w)*$"));
static SETTING_NAME: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z-_][a-zA-Z0-9-_]*$"));

/// Runs every structural check.
///
/// # Errors
///
/// Returns all problems found, aggregated.
pub fn validate_structure(bp: &Blueprint, catalog: &dyn ModuleInfoSource) -> Result<()> {
    tracing::info!(blueprint = %bp.blueprint_name, "validating blueprint structure");
    let mut errs = Errors::new();
    check_groups(bp, &mut errs);
    check_modules(bp, catalog, MOVED_MODULES, &mut errs);
    errs.into_result()
}

/// Checks that `name` is a valid group name.
///
/// # Errors
///
/// Returns an error for empty names and names outside `^\w(-*\w)*$`.
pub fn check_group_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BlueprintError::EmptyGroupName);
    }
    if !is_match(&GROUP_NAME, name) {
        return Err(BlueprintError::InvalidGroupName {
            name: GroupName::new(name),
        });
    }
    Ok(())
}

fn check_groups(bp: &Blueprint, errs: &mut Errors) {
    let mut seen = HashSet::new();
    for (ig, group) in bp.groups.iter().enumerate() {
        let gp = Path::root().groups().at(ig);
        match check_group_name(group.name.as_str()) {
            Err(e) => {
                let _ = errs.at(gp.name(), e);
            }
            Ok(()) if !seen.insert(group.name.clone()) => {
                let _ = errs.at(
                    gp.name(),
                    BlueprintError::Duplicate {
                        kind: "group names",
                        name: group.name.to_string(),
                    },
                );
            }
            Ok(()) => {}
        }
        if let Err(e) = check_group_kind(group) {
            let _ = errs.at(gp.modules(), e);
        }
    }
}

/// Checks that a group is non-empty, homogeneous, and that a Packer group
/// holds a single module.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn check_group_kind(group: &Group) -> Result<()> {
    let Some(first) = group.modules.first() else {
        return Err(BlueprintError::EmptyGroup {
            group: group.name.clone(),
        });
    };
    if let Some(other) = group.modules.iter().find(|m| m.kind != first.kind) {
        return Err(BlueprintError::MixedModules {
            group: group.name.clone(),
            got: other.kind,
            wanted: first.kind,
        });
    }
    if first.kind == ModuleKind::Packer && group.modules.len() > 1 {
        return Err(BlueprintError::PackerGroupSize {
            group: group.name.clone(),
            count: group.modules.len(),
        });
    }
    Ok(())
}

fn check_modules(
    bp: &Blueprint,
    catalog: &dyn ModuleInfoSource,
    moved: &[(&str, &str)],
    errs: &mut Errors,
) {
    let mut seen = HashSet::new();
    // The walk callback never fails; problems go to `errs`.
    let _ = bp.walk_modules(|mp, module| {
        if !module.id.is_empty() && !seen.insert(module.id.clone()) {
            let _ = errs.at(
                mp.id(),
                BlueprintError::Duplicate {
                    kind: "module IDs",
                    name: module.id.to_string(),
                },
            );
        }
        check_module(&mp, module, moved, errs);
        match catalog.module_info(&module.source, module.kind) {
            Ok(info) => {
                if let Err(e) = validate_settings(module, &info, &mp.settings()) {
                    let _ = errs.add(e);
                }
                if let Err(e) = validate_outputs(module, &info, &mp.outputs()) {
                    let _ = errs.add(e);
                }
            }
            Err(e) if !module.source.is_empty() => {
                let _ = errs.at(mp.source(), e);
            }
            Err(_) => {}
        }
        Ok(())
    });
}

fn check_module(mp: &ModulePath, module: &Module, moved: &[(&str, &str)], errs: &mut Errors) {
    if module.id.is_empty() {
        let _ = errs.at(mp.id(), BlueprintError::EmptyModuleId);
    } else if module.id.as_str() == GLOBAL_NAMESPACE {
        let _ = errs.at(
            mp.id(),
            BlueprintError::ReservedModuleId {
                id: module.id.clone(),
            },
        );
    }
    if module.source.is_empty() {
        let _ = errs.at(mp.source(), BlueprintError::EmptyModuleSource);
    } else if let Err(e) = check_moved_module(&module.source, moved) {
        let _ = errs.at(mp.source(), e);
    }
}

/// Rejects sources listed in `moved`, naming the replacement.
///
/// # Errors
///
/// Returns [`BlueprintError::MovedModule`] when `source` was relocated.
pub fn check_moved_module(source: &str, moved: &[(&str, &str)]) -> Result<()> {
    let trimmed = source.trim_start_matches("./");
    match moved.iter().find(|(old, _)| *old == trimmed) {
        Some((old, new)) => Err(BlueprintError::MovedModule {
            old: (*old).to_owned(),
            new: (*new).to_owned(),
        }),
        None => Ok(()),
    }
}

/// Checks setting names against the module's inputs.
///
/// A key failing one check is not checked further.
///
/// # Errors
///
/// Returns all invalid settings, each located under `path`.
pub fn validate_settings(module: &Module, info: &ModuleInfo, path: &MapPath) -> Result<()> {
    let mut errs = Errors::new();
    let inputs: Vec<&str> = info.inputs.iter().map(|i| i.name.as_str()).collect();
    for key in module.settings.keys() {
        let err = if key.contains('.') {
            BlueprintError::SettingWithPeriod
        } else if !is_match(&SETTING_NAME, key) {
            BlueprintError::SettingInvalidChar
        } else if info.input(key).is_none() {
            match closest_match(key, inputs.iter().copied()) {
                Some(hint) => BlueprintError::UnknownSetting.with_hint(format!("did you mean {hint:?}?")),
                None => BlueprintError::UnknownSetting,
            }
        } else {
            warn_on_escaped_references(module, key);
            continue;
        };
        let _ = errs.at(path.dot(key), err);
    }
    errs.into_result()
}

fn warn_on_escaped_references(module: &Module, key: &str) {
    let mut literal_refs = false;
    module.settings.get(key).walk(&mut |v| {
        if let Value::String(s) = v {
            literal_refs |= literal::has_variable(s);
        }
    });
    if literal_refs {
        tracing::warn!(
            module = %module.id,
            setting = key,
            "setting contains an escaped $(...) and is passed through as plain text"
        );
    }
}

/// Checks that every declared output exists on the module.
///
/// # Errors
///
/// Returns all unknown outputs, each located under `path`.
pub fn validate_outputs(module: &Module, info: &ModuleInfo, path: &OutputsPath) -> Result<()> {
    let mut errs = Errors::new();
    for (i, output) in module.outputs.iter().enumerate() {
        if !info.has_output(&output.name) {
            let _ = errs.at(
                path.at(i).name(),
                BlueprintError::InvalidOutput {
                    output: output.name.clone(),
                },
            );
        }
    }
    errs.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_info::{ModuleCatalog, OutputInfo, VarInfo};

    fn catalog() -> ModuleCatalog {
        let info = ModuleInfo {
            inputs: vec![
                VarInfo {
                    name: "zone".to_owned(),
                    type_: "string".to_owned(),
                    ..VarInfo::default()
                },
                VarInfo {
                    name: "network_name".to_owned(),
                    type_: "string".to_owned(),
                    ..VarInfo::default()
                },
            ],
            outputs: vec![OutputInfo::named("network_name")],
        };
        ModuleCatalog::new()
            .with("modules/net", ModuleKind::Unknown, info)
            .with("packer/img", ModuleKind::Packer, ModuleInfo::default())
    }

    fn module(id: &str, source: &str, kind: ModuleKind) -> Module {
        let mut m = Module::new(id, source);
        m.kind = kind;
        m
    }

    fn group(name: &str, modules: Vec<Module>) -> Group {
        Group {
            name: GroupName::new(name),
            modules,
            ..Group::default()
        }
    }

    fn blueprint(groups: Vec<Group>) -> Blueprint {
        Blueprint {
            blueprint_name: "bp".to_owned(),
            groups,
            ..Blueprint::default()
        }
    }

    fn tf(id: &str) -> Module {
        module(id, "modules/net", ModuleKind::Terraform)
    }

    #[test]
    fn valid_blueprint_passes() {
        let bp = blueprint(vec![
            group("primary", vec![tf("a"), tf("b")]),
            group("image", vec![module("img", "packer/img", ModuleKind::Packer)]),
        ]);
        validate_structure(&bp, &catalog()).expect("should validate");
    }

    #[test]
    fn group_names_follow_pattern() {
        assert!(check_group_name("group-1").is_ok());
        assert!(check_group_name("a--b").is_ok());
        let err = check_group_name("").unwrap_err();
        assert!(err.to_string().contains("must be set"), "got: {err}");
        for bad in ["-a", "a-", "a b", "a.b"] {
            let err = check_group_name(bad).unwrap_err();
            assert!(err.to_string().contains("invalid character"), "{bad}: {err}");
        }
    }

    #[test]
    fn duplicate_module_ids_across_groups_are_reported() {
        let bp = blueprint(vec![group("g1", vec![tf("a")]), group("g2", vec![tf("a")])]);
        let msg = validate_structure(&bp, &catalog()).unwrap_err().to_string();
        assert!(msg.contains("a used more than once"), "got: {msg}");
        assert!(msg.contains("deployment_groups[1].modules[0].id"), "got: {msg}");
    }

    #[test]
    fn duplicate_group_names_are_reported() {
        let bp = blueprint(vec![group("g", vec![tf("a")]), group("g", vec![tf("b")])]);
        let msg = validate_structure(&bp, &catalog()).unwrap_err().to_string();
        assert!(msg.contains("group names must be unique"), "got: {msg}");
    }

    #[test]
    fn independent_errors_accumulate() {
        let bp = blueprint(vec![
            group("bad name", vec![tf("a")]),
            group("empty", vec![]),
            group("g3", vec![tf("vars")]),
        ]);
        let err = validate_structure(&bp, &catalog()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("3 errors encountered"), "got: {msg}");
        assert!(msg.contains("invalid character"), "got: {msg}");
        assert!(msg.contains("at least one module"), "got: {msg}");
        assert!(msg.contains("reserved"), "got: {msg}");
    }

    #[test]
    fn mixed_kinds_are_rejected() {
        let g = group("g", vec![tf("a"), module("img", "packer/img", ModuleKind::Packer)]);
        let err = check_group_kind(&g).unwrap_err();
        assert!(err.to_string().contains("mixing modules of differing kinds"), "got: {err}");
    }

    #[test]
    fn packer_group_must_have_one_module() {
        let g = group(
            "g",
            vec![
                module("i1", "packer/img", ModuleKind::Packer),
                module("i2", "packer/img", ModuleKind::Packer),
            ],
        );
        let err = check_group_kind(&g).unwrap_err();
        assert!(err.to_string().contains("has 2"), "got: {err}");
    }

    #[test]
    fn moved_module_names_replacement() {
        let moved = [("old/path", "new/path")];
        assert!(check_moved_module("other", &moved).is_ok());
        let err = check_moved_module("./old/path", &moved).unwrap_err();
        assert!(err.to_string().contains("replaced with new/path"), "got: {err}");
        let err = check_moved_module(MOVED_MODULES[0].0, MOVED_MODULES).unwrap_err();
        assert!(err.to_string().contains(MOVED_MODULES[0].1), "got: {err}");
    }

    #[test]
    fn empty_id_and_source_are_reported() {
        let bp = blueprint(vec![group("g", vec![Module::default()])]);
        let msg = validate_structure(&bp, &catalog()).unwrap_err().to_string();
        assert!(msg.contains("module id cannot be empty"), "got: {msg}");
        assert!(msg.contains("module source cannot be empty"), "got: {msg}");
    }

    #[test]
    fn settings_checks_short_circuit_per_key() {
        let mut m = tf("a");
        let _ = m
            .settings
            .set("zone", Value::from("z"))
            .set("zone.sub", Value::from("z"))
            .set("1zone", Value::from("z"))
            .set("zome", Value::from("z"));
        let info = catalog()
            .module_info("modules/net", ModuleKind::Terraform)
            .expect("info");
        let path = Path::root().groups().at(0).modules().at(0).settings();
        let err = validate_settings(&m, &info, &path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("3 errors encountered"), "got: {msg}");
        assert!(msg.contains("settings.zone.sub: a setting name contains a period"), "got: {msg}");
        assert!(msg.contains("settings.1zone: a setting name must begin"), "got: {msg}");
        assert!(msg.contains(r#"not found in the module - did you mean "zone"?"#), "got: {msg}");
    }

    #[test]
    fn outputs_must_exist() {
        let mut m = tf("a");
        m.outputs = vec![OutputInfo::named("network_name"), OutputInfo::named("nope")];
        let info = catalog()
            .module_info("modules/net", ModuleKind::Terraform)
            .expect("info");
        let path = Path::root().groups().at(0).modules().at(0).outputs();
        let err = validate_outputs(&m, &info, &path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("outputs[1].name"), "got: {msg}");
        assert!(msg.contains("nope"), "got: {msg}");
    }

    #[test]
    fn unknown_source_is_reported() {
        let bp = blueprint(vec![group("g", vec![module("a", "modules/missing", ModuleKind::Terraform)])]);
        let msg = validate_structure(&bp, &catalog()).unwrap_err().to_string();
        assert!(msg.contains("module info not found"), "got: {msg}");
    }
}
