//! `use` propagation and global variable injection.

use std::collections::{BTreeMap, BTreeSet};

use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::types::ModuleId;

use crate::blueprint::{Blueprint, Module};
use crate::dict::Entry;
use crate::expression::Expression;
use crate::module_info::{ModuleInfo, ModuleInfoSource};
use crate::reference::Reference;
use crate::value::Value;

/// Fills inputs of `module` from the outputs of `used`.
///
/// Inputs named in `ignore` are never touched. A scalar input is set to a
/// reference to the matching output unless it already has a value; a list
/// input accumulates every contributing output as `flatten([new, existing])`.
pub fn use_module(
    module: &mut Module,
    used: &Module,
    module_info: &ModuleInfo,
    used_info: &ModuleInfo,
    ignore: &BTreeSet<String>,
) {
    for output in &used_info.outputs {
        let Some(input) = module_info.input(&output.name) else {
            continue;
        };
        if ignore.contains(&input.name) {
            continue;
        }
        let current = module.settings.entry(&input.name);
        if current.is_some() && !input.is_list() {
            continue;
        }
        let reference = Entry::as_product_of_module_use(
            Reference::module(used.id.clone(), output.name.clone()).as_value(),
            [used.id.clone()],
        );
        let entry = match current {
            Some(existing) if input.is_list() => accumulate(reference, &existing),
            _ => reference,
        };
        tracing::debug!(module = %module.id, used = %used.id, setting = %input.name, "applying use");
        let _ = module.settings.set_entry(input.name.clone(), entry);
    }
}

fn accumulate(new: Entry, existing: &Entry) -> Entry {
    let flattened = Expression::function_call(
        "flatten",
        &[Value::List(vec![new.value.clone(), existing.value.clone()])],
    );
    let contributors = new
        .is_product_of_module_use()
        .iter()
        .chain(existing.is_product_of_module_use())
        .cloned();
    Entry::as_product_of_module_use(Value::Expression(flattened), contributors)
}

/// Applies [`use_module`] for every module and every entry of its `use`
/// list, in declaration order.
///
/// Settings present before propagation are never overwritten.
///
/// # Errors
///
/// Returns an error if a used module or a module interface is missing.
pub fn apply_use_modules(bp: &mut Blueprint, catalog: &dyn ModuleInfoSource) -> Result<()> {
    tracing::info!("applying use modules");
    let snapshot: BTreeMap<ModuleId, Module> = bp
        .groups
        .iter()
        .flat_map(|g| g.modules.iter())
        .map(|m| (m.id.clone(), m.clone()))
        .collect();
    bp.walk_modules_mut(|mp, module| {
        if module.use_.is_empty() {
            return Ok(());
        }
        let ignore: BTreeSet<String> = module.settings.keys().map(str::to_owned).collect();
        let info = catalog
            .module_info(&module.source, module.kind)
            .map_err(|e| e.at(mp.source()))?;
        let uses = module.use_.clone();
        for (i, used_id) in uses.iter().enumerate() {
            let used = snapshot
                .get(used_id)
                .ok_or_else(|| BlueprintError::UnknownModule { id: used_id.clone() }.at(mp.uses().at(i)))?;
            let used_info = catalog
                .module_info(&used.source, used.kind)
                .map_err(|e| e.at(mp.uses().at(i)))?;
            use_module(module, used, &info, &used_info, &ignore);
        }
        Ok(())
    })
}

/// Sets every unset input to the same-named global variable, if any.
///
/// # Errors
///
/// Returns [`BlueprintError::MissingSetting`] for a required input that
/// has neither a value nor a global variable, or an error if a module
/// interface is missing.
pub fn apply_global_variables(bp: &mut Blueprint, catalog: &dyn ModuleInfoSource) -> Result<()> {
    tracing::info!("applying global variables");
    let globals: BTreeSet<String> = bp.vars.keys().map(str::to_owned).collect();
    bp.walk_modules_mut(|mp, module| {
        let info = catalog
            .module_info(&module.source, module.kind)
            .map_err(|e| e.at(mp.source()))?;
        for input in &info.inputs {
            if module.settings.has(&input.name) {
                continue;
            }
            if globals.contains(&input.name) {
                let _ = module
                    .settings
                    .set(input.name.clone(), Reference::global(input.name.clone()).as_value());
            } else if input.required {
                return Err(BlueprintError::MissingSetting {
                    id: module.id.clone(),
                    setting: input.name.clone(),
                }
                .at(mp.settings()));
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use ghpc_common::types::{GroupName, ModuleKind};

    use super::*;
    use crate::blueprint::Group;
    use crate::module_info::{ModuleCatalog, OutputInfo, VarInfo};

    fn input(name: &str, type_: &str, required: bool) -> VarInfo {
        VarInfo {
            name: name.to_owned(),
            type_: type_.to_owned(),
            description: None,
            required,
        }
    }

    fn catalog() -> ModuleCatalog {
        let producer = ModuleInfo {
            inputs: Vec::new(),
            outputs: vec![
                OutputInfo::named("network_name"),
                OutputInfo::named("tags"),
                OutputInfo::named("zone"),
            ],
        };
        let consumer = ModuleInfo {
            inputs: vec![
                input("network_name", "string", false),
                input("tags", "list(string)", false),
                input("zone", "string", false),
                input("project_id", "string", true),
            ],
            outputs: Vec::new(),
        };
        ModuleCatalog::new()
            .with("modules/producer", ModuleKind::Unknown, producer)
            .with("modules/consumer", ModuleKind::Unknown, consumer)
    }

    fn module(id: &str, source: &str) -> Module {
        let mut m = Module::new(id, source);
        m.kind = ModuleKind::Terraform;
        m
    }

    fn blueprint(consumer: Module) -> Blueprint {
        Blueprint {
            blueprint_name: "bp".to_owned(),
            groups: vec![Group {
                name: GroupName::new("g"),
                modules: vec![
                    module("a", "modules/producer"),
                    module("b", "modules/producer"),
                    consumer,
                ],
                ..Group::default()
            }],
            ..Blueprint::default()
        }
    }

    fn consumer(uses: &[&str]) -> Module {
        let mut m = module("c", "modules/consumer");
        m.use_ = uses.iter().map(|u| ModuleId::new(*u)).collect();
        m
    }

    fn settings_of(bp: &Blueprint) -> &crate::dict::Dict {
        &bp.groups[0].modules[2].settings
    }

    #[test]
    fn scalar_inputs_take_first_used_module() {
        let mut bp = blueprint(consumer(&["a", "b"]));
        apply_use_modules(&mut bp, &catalog()).expect("should apply");
        let entry = settings_of(&bp).entry("network_name").expect("set");
        assert_eq!(entry.value, Reference::module("a", "network_name").as_value());
        assert_eq!(entry.is_product_of_module_use(), &[ModuleId::new("a")]);
    }

    #[test]
    fn list_inputs_accumulate_with_flatten() {
        let mut bp = blueprint(consumer(&["a", "b"]));
        apply_use_modules(&mut bp, &catalog()).expect("should apply");
        let entry = settings_of(&bp).entry("tags").expect("set");
        let Value::Expression(e) = &entry.value else {
            panic!("expected expression, got {:?}", entry.value);
        };
        assert_eq!(e.text(), "flatten([module.b.tags, module.a.tags])");
        assert_eq!(
            entry.is_product_of_module_use(),
            &[ModuleId::new("a"), ModuleId::new("b")]
        );
    }

    #[test]
    fn user_settings_are_never_overwritten() {
        let mut c = consumer(&["a", "b"]);
        let _ = c
            .settings
            .set("tags", Value::List(vec![Value::from("mine")]))
            .set("zone", Value::from("z"));
        let mut bp = blueprint(c);
        apply_use_modules(&mut bp, &catalog()).expect("should apply");
        let settings = settings_of(&bp);
        assert_eq!(settings.get("tags"), Value::List(vec![Value::from("mine")]));
        assert_eq!(settings.get("zone"), Value::from("z"));
        assert!(settings.entry("tags").is_some_and(|e| e.is_product_of_module_use().is_empty()));
    }

    #[test]
    fn missing_used_module_is_located() {
        let mut bp = blueprint(consumer(&["nope"]));
        let err = apply_use_modules(&mut bp, &catalog()).unwrap_err();
        assert!(err.to_string().contains("use[0]"), "got: {err}");
    }

    #[test]
    fn globals_fill_unset_inputs() {
        let mut bp = blueprint(consumer(&[]));
        let _ = bp
            .vars
            .set("project_id", Value::from("p"))
            .set("zone", Value::from("z"));
        apply_global_variables(&mut bp, &catalog()).expect("should apply");
        let settings = settings_of(&bp);
        assert_eq!(settings.get("project_id"), Reference::global("project_id").as_value());
        assert_eq!(settings.get("zone"), Reference::global("zone").as_value());
        assert!(!settings.has("tags"));
    }

    #[test]
    fn required_input_without_value_fails() {
        let mut bp = blueprint(consumer(&[]));
        let err = apply_global_variables(&mut bp, &catalog()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Module.ID: c Setting: project_id"), "got: {msg}");
        assert!(msg.starts_with("deployment_groups[0].modules[2].settings"), "got: {msg}");
    }

    #[test]
    fn use_values_win_over_globals() {
        let mut bp = blueprint(consumer(&["a"]));
        let _ = bp
            .vars
            .set("project_id", Value::from("p"))
            .set("zone", Value::from("z"));
        apply_use_modules(&mut bp, &catalog()).expect("use");
        apply_global_variables(&mut bp, &catalog()).expect("globals");
        assert_eq!(settings_of(&bp).get("zone"), Reference::module("a", "zone").as_value());
    }
}
