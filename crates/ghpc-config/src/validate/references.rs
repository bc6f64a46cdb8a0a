//! Existence and ordering checks for module references.

use ghpc_common::constants::GLOBAL_NAMESPACE;
use ghpc_common::error::{BlueprintError, Errors, Result};
use ghpc_common::path::ListPath;
use ghpc_common::types::{ModuleId, ModuleKind};

use super::closest_match;
use crate::blueprint::{Blueprint, Module};
use crate::module_info::ModuleInfoSource;
use crate::reference::Reference;

fn hinted(err: BlueprintError, hint: Option<String>) -> BlueprintError {
    match hint {
        Some(h) => err.with_hint(format!("did you mean {h:?}?")),
        None => err,
    }
}

/// Checks that `from` may reference module `to`.
///
/// The target must exist, must not be a Packer module and must not be in
/// a later group than `from`.
///
/// # Errors
///
/// Returns the first violated rule. Unknown modules carry a suggestion,
/// which may be the global namespace `vars`.
pub fn validate_module_reference(bp: &Blueprint, from: &Module, to: &ModuleId) -> Result<()> {
    let Ok(target) = bp.module(to) else {
        let ids = bp.module_ids();
        let candidates = ids
            .iter()
            .map(ModuleId::as_str)
            .chain(std::iter::once(GLOBAL_NAMESPACE));
        return Err(hinted(
            BlueprintError::UnknownModule { id: to.clone() },
            closest_match(to.as_str(), candidates),
        ));
    };
    if target.kind == ModuleKind::Packer {
        return Err(BlueprintError::PackerReference { id: to.clone() });
    }
    if bp.module_group_index(to)? > bp.module_group_index(&from.id)? {
        return Err(BlueprintError::IntergroupOrder { id: to.clone() });
    }
    Ok(())
}

/// Checks a reference found in a setting of `from`.
///
/// Global references must name a global variable. Module references must
/// pass [`validate_module_reference`] and name an output of the target.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_module_setting_reference(
    bp: &Blueprint,
    catalog: &dyn ModuleInfoSource,
    from: &Module,
    r: &Reference,
) -> Result<()> {
    if r.is_global {
        if bp.vars.has(&r.name) {
            return Ok(());
        }
        return Err(hinted(
            BlueprintError::UnknownVariable {
                name: r.name.clone(),
            },
            closest_match(&r.name, bp.vars.keys()),
        ));
    }
    let to = r.module_id();
    validate_module_reference(bp, from, &to)?;
    let target = bp.module(&to)?;
    let info = catalog.module_info(&target.source, target.kind)?;
    if info.has_output(&r.name) {
        return Ok(());
    }
    Err(hinted(
        BlueprintError::NoOutput {
            module: to,
            output: r.name.clone(),
        },
        closest_match(&r.name, info.outputs.iter().map(|o| o.name.as_str())),
    ))
}

/// Checks every entry of `module`'s `use` list.
///
/// # Errors
///
/// Returns all invalid entries, each located under `path`.
pub fn validate_module_use_references(bp: &Blueprint, module: &Module, path: &ListPath) -> Result<()> {
    let mut errs = Errors::new();
    for (i, used) in module.use_.iter().enumerate() {
        if let Err(e) = validate_module_reference(bp, module, used) {
            let _ = errs.at(path.at(i), e);
        }
    }
    errs.into_result()
}

/// Checks `use` lists and setting references of every module.
///
/// # Errors
///
/// Returns all problems found, aggregated and located.
pub fn validate_module_references(bp: &Blueprint, catalog: &dyn ModuleInfoSource) -> Result<()> {
    tracing::info!("validating module references");
    let mut errs = Errors::new();
    let _ = bp.walk_modules(|mp, module| {
        if let Err(e) = validate_module_use_references(bp, module, &mp.uses()) {
            let _ = errs.add(e);
        }
        for key in module.settings.keys() {
            for r in module.settings.get(key).references() {
                if let Err(e) = validate_module_setting_reference(bp, catalog, module, &r) {
                    let _ = errs.at(mp.settings().dot(key), e);
                }
            }
        }
        Ok(())
    });
    errs.into_result()
}
