//! Default labels and their propagation into modules.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use ghpc_common::constants::{
    BLUEPRINT_LABEL, DEPLOYMENT_LABEL, DEPLOYMENT_NAME_VAR, LABELS_VAR, ROLE_FALLBACK, ROLE_LABEL,
};
use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::path::Path;

use crate::blueprint::Blueprint;
use crate::expression::Expression;
use crate::module_info::ModuleInfoSource;
use crate::reference::Reference;
use crate::value::Value;

fn default_labels(bp: &Blueprint) -> BTreeMap<String, Value> {
    let mut labels = BTreeMap::new();
    let _ = labels.insert(BLUEPRINT_LABEL.to_owned(), Value::from(bp.blueprint_name.as_str()));
    if bp.vars.has(DEPLOYMENT_NAME_VAR) {
        let _ = labels.insert(
            DEPLOYMENT_LABEL.to_owned(),
            Reference::global(DEPLOYMENT_NAME_VAR).as_value(),
        );
    }
    labels
}

/// Role of a module: the name of the directory enclosing its source.
///
/// `modules/network/vpc` has role `network`. Sources without an enclosing
/// directory (`vpc`, `./vpc`, `../vpc`, `/vpc`) get [`ROLE_FALLBACK`].
#[must_use]
pub fn module_role(source: &str) -> String {
    FsPath::new(source)
        .parent()
        .and_then(FsPath::file_name)
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or(ROLE_FALLBACK)
        .to_owned()
}

/// Completes the global `labels` variable and wires it into modules.
///
/// Missing default labels are added to the global labels. Every module
/// with a `labels` input gets `merge(var.labels, <its labels>)`, where its
/// labels carry a `ghpc_role` unless the module already sets one.
///
/// # Errors
///
/// Returns a type error if the global or a module's labels are not a map,
/// or an error if a module interface is missing.
pub fn combine_labels(bp: &mut Blueprint, catalog: &dyn ModuleInfoSource) -> Result<()> {
    tracing::info!("combining labels");
    let defaults = default_labels(bp);
    let labels = match bp.vars.entry(LABELS_VAR).map(|e| e.value) {
        None => defaults,
        Some(Value::Object(mut user)) => {
            for (k, v) in defaults {
                let _ = user.entry(k).or_insert(v);
            }
            user
        }
        Some(_) => {
            return Err(BlueprintError::Type {
                message: format!("vars.{LABELS_VAR} must be a map"),
            }
            .at(Path::root().vars().dot(LABELS_VAR)));
        }
    };
    let _ = bp.vars.set(LABELS_VAR, Value::Object(labels));

    let global = Reference::global(LABELS_VAR).as_value();
    bp.walk_modules_mut(|mp, module| {
        let info = catalog
            .module_info(&module.source, module.kind)
            .map_err(|e| e.at(mp.source()))?;
        if info.input(LABELS_VAR).is_none() {
            return Ok(());
        }
        let mut role = BTreeMap::new();
        let _ = role.insert(ROLE_LABEL.to_owned(), Value::from(module_role(&module.source).as_str()));
        let args = match module.settings.get(LABELS_VAR) {
            Value::Null => vec![global.clone(), Value::Object(role)],
            Value::Object(mut own) => {
                for (k, v) in role {
                    let _ = own.entry(k).or_insert(v);
                }
                vec![global.clone(), Value::Object(own)]
            }
            own @ Value::Expression(_) => vec![global.clone(), Value::Object(role), own],
            other => {
                return Err(BlueprintError::Type {
                    message: format!("module labels must be a map, got {}", other.type_name()),
                }
                .at(mp.settings().dot(LABELS_VAR)));
            }
        };
        let merged = Expression::function_call("merge", &args);
        let _ = module.settings.set(LABELS_VAR, Value::Expression(merged));
        Ok(())
    })
}
