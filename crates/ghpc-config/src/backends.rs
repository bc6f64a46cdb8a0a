//! Terraform backend defaults.

use ghpc_common::constants::{DEPLOYMENT_NAME_VAR, GCS_BACKEND, VAR_ROOT};
use ghpc_common::error::Result;
use ghpc_common::path::Path;

use crate::blueprint::{Backend, Blueprint};
use crate::expression::Expression;
use crate::expression::ast::{Expr, TemplatePart};
use crate::value::Value;

const PREFIX: &str = "prefix";

/// `"<blueprint>/${var.deployment_name}/<group>"`
fn gcs_prefix(blueprint: &str, group: &str) -> Value {
    Value::Expression(Expression::from_ast(Expr::Template(vec![
        TemplatePart::Literal(format!("{blueprint}/")),
        TemplatePart::Interp(Expr::traversal(VAR_ROOT, [DEPLOYMENT_NAME_VAR])),
        TemplatePart::Literal(format!("/{group}")),
    ])))
}

/// Gives every group a backend and a `gcs` state prefix.
///
/// Groups without a backend inherit the blueprint default. A `gcs`
/// backend without `prefix` gets one unique to the blueprint, deployment
/// and group.
pub fn expand_backends(bp: &mut Blueprint) {
    tracing::info!("expanding backends");
    let defaults = bp.backend_defaults.clone();
    for group in &mut bp.groups {
        if group.backend.is_none() && !defaults.is_empty() {
            group.backend = Some(defaults.clone());
        }
        if let Some(backend) = &mut group.backend {
            if backend.kind == GCS_BACKEND && !backend.configuration.has(PREFIX) {
                let _ = backend
                    .configuration
                    .set(PREFIX, gcs_prefix(&bp.blueprint_name, group.name.as_str()));
            }
        }
    }
}

/// Evaluates every backend configuration against the global variables.
///
/// # Errors
///
/// Returns the first evaluation error, located at the backend.
pub fn materialize_backends(bp: &mut Blueprint) -> Result<()> {
    let evaluate = |bp: &Blueprint, backend: &Backend| -> Result<Backend> {
        Ok(Backend {
            kind: backend.kind.clone(),
            configuration: bp.eval_dict(&backend.configuration)?,
        })
    };
    let defaults = evaluate(bp, &bp.backend_defaults)
        .map_err(|e| e.at(Path::root().backend_defaults().configuration()))?;
    let mut groups = Vec::with_capacity(bp.groups.len());
    for (ig, group) in bp.groups.iter().enumerate() {
        groups.push(match &group.backend {
            Some(backend) => Some(
                evaluate(bp, backend)
                    .map_err(|e| e.at(Path::root().groups().at(ig).backend().configuration()))?,
            ),
            None => None,
        });
    }
    bp.backend_defaults = defaults;
    for (group, backend) in bp.groups.iter_mut().zip(groups) {
        group.backend = backend;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ghpc_common::types::GroupName;

    use super::*;
    use crate::blueprint::Group;

    fn blueprint(defaults: Backend) -> Blueprint {
        Blueprint {
            blueprint_name: "hpc".to_owned(),
            backend_defaults: defaults,
            groups: vec![
                Group {
                    name: GroupName::new("g1"),
                    ..Group::default()
                },
                Group {
                    name: GroupName::new("g2"),
                    backend: Some(Backend {
                        kind: "local".to_owned(),
                        ..Backend::default()
                    }),
                    ..Group::default()
                },
            ],
            ..Blueprint::default()
        }
    }

    fn gcs() -> Backend {
        let mut be = Backend {
            kind: GCS_BACKEND.to_owned(),
            ..Backend::default()
        };
        let _ = be.configuration.set("bucket", Value::from("state"));
        be
    }

    #[test]
    fn groups_inherit_defaults_and_get_prefix() {
        let mut bp = blueprint(gcs());
        expand_backends(&mut bp);
        let be = bp.groups[0].backend.as_ref().expect("inherited");
        assert_eq!(be.kind, GCS_BACKEND);
        let Value::Expression(prefix) = be.configuration.get(PREFIX) else {
            panic!("expected prefix expression");
        };
        assert_eq!(prefix.text(), r#""hpc/${var.deployment_name}/g1""#);
        let own = bp.groups[1].backend.as_ref().expect("own backend");
        assert_eq!(own.kind, "local");
        assert!(!own.configuration.has(PREFIX));
    }

    #[test]
    fn explicit_prefix_is_kept() {
        let mut defaults = gcs();
        let _ = defaults.configuration.set(PREFIX, Value::from("mine"));
        let mut bp = blueprint(defaults);
        expand_backends(&mut bp);
        let be = bp.groups[0].backend.as_ref().expect("inherited");
        assert_eq!(be.configuration.get(PREFIX), Value::from("mine"));
    }

    #[test]
    fn no_defaults_leaves_groups_alone() {
        let mut bp = blueprint(Backend::default());
        expand_backends(&mut bp);
        assert!(bp.groups[0].backend.is_none());
    }

    #[test]
    fn materialize_evaluates_prefix() {
        let mut bp = blueprint(gcs());
        let _ = bp.vars.set(DEPLOYMENT_NAME_VAR, Value::from("dep"));
        expand_backends(&mut bp);
        materialize_backends(&mut bp).expect("should evaluate");
        let be = bp.groups[0].backend.as_ref().expect("inherited");
        assert_eq!(be.configuration.get(PREFIX), Value::from("hpc/dep/g1"));
        assert_eq!(be.configuration.get("bucket"), Value::from("state"));
    }
}
