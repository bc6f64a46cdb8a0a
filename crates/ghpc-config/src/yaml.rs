//! Reading and writing blueprint documents.

use std::path::Path as FsPath;

use ghpc_common::error::{BlueprintError, Result};

use crate::blueprint::Blueprint;

/// Parses a blueprint document.
///
/// # Errors
///
/// Returns an error for malformed YAML, unknown fields, invalid module
/// kinds and malformed embedded expressions.
pub fn parse_blueprint(text: &str) -> Result<Blueprint> {
    Ok(serde_yaml::from_str(text)?)
}

/// Reads a blueprint file, remembering its location for `ghpc_stage`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_blueprint(path: &FsPath) -> Result<Blueprint> {
    let text = std::fs::read_to_string(path).map_err(|source| BlueprintError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bp = parse_blueprint(&text)?;
    bp.path = std::path::absolute(path).map_err(|source| BlueprintError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %bp.path.display(), blueprint = %bp.blueprint_name, "loaded blueprint");
    Ok(bp)
}

/// Renders a blueprint as YAML; expressions are written as `((...))`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_yaml(bp: &Blueprint) -> Result<String> {
    Ok(serde_yaml::to_string(bp)?)
}

/// Renders a blueprint as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(bp: &Blueprint) -> Result<String> {
    Ok(serde_json::to_string_pretty(bp)?)
}

#[cfg(test)]
mod tests {
    use ghpc_common::config::ValidationLevel;
    use ghpc_common::types::ModuleKind;

    use super::*;
    use crate::value::Value;

    const BLUEPRINT: &str = r#"
blueprint_name: hpc-slurm
validation_level: WARNING
vars:
  project_id: my-project
  deployment_name: dep
  region: us-central1
  zone: $(vars.region)-a
terraform_backend_defaults:
  type: gcs
  configuration:
    bucket: state
deployment_groups:
- group: primary
  modules:
  - id: network
    source: modules/network/vpc
  - id: cluster
    source: modules/compute/vm
    kind: terraform
    use: [network]
    settings:
      name: ((upper(var.deployment_name)))
      literal: \((not an expression))
    outputs:
    - name
"#;

    #[test]
    fn parses_full_document() {
        let bp = parse_blueprint(BLUEPRINT).expect("should parse");
        assert_eq!(bp.blueprint_name, "hpc-slurm");
        assert_eq!(bp.validation_level, ValidationLevel::Warning);
        assert_eq!(bp.backend_defaults.kind, "gcs");
        assert_eq!(bp.groups.len(), 1);
        let modules = &bp.groups[0].modules;
        assert_eq!(modules[0].kind, ModuleKind::Unknown);
        assert_eq!(modules[1].kind, ModuleKind::Terraform);
        assert_eq!(modules[1].use_.len(), 1);
        assert_eq!(modules[1].outputs[0].name, "name");
        assert!(matches!(bp.vars.get("zone"), Value::Expression(_)));
        assert_eq!(
            modules[1].settings.get("literal"),
            Value::from("((not an expression))")
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_blueprint("blueprint_name: x\nbogus: 1\n").unwrap_err();
        assert!(err.to_string().contains("bogus"), "got: {err}");
    }

    #[test]
    fn invalid_kind_is_rejected() {
        let text = "blueprint_name: x\ndeployment_groups:\n- group: g\n  modules:\n  - id: a\n    source: s\n    kind: ansible\n";
        let err = parse_blueprint(text).unwrap_err();
        assert!(err.to_string().contains("kind is invalid"), "got: {err}");
    }

    #[test]
    fn yaml_output_reparses_to_same_blueprint() {
        let bp = parse_blueprint(BLUEPRINT).expect("should parse");
        let text = to_yaml(&bp).expect("should render");
        assert!(text.contains("((var.region))") || text.contains("${var.region}"), "got: {text}");
        let again = parse_blueprint(&text).expect("should reparse");
        assert_eq!(again, bp);
    }

    #[test]
    fn json_output_is_valid() {
        let bp = parse_blueprint(BLUEPRINT).expect("should parse");
        let text = to_json(&bp).expect("should render");
        let v: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(v["blueprint_name"], "hpc-slurm");
    }

    #[test]
    fn load_sets_absolute_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bp.yaml");
        std::fs::write(&path, BLUEPRINT).expect("write");
        let bp = load_blueprint(&path).expect("should load");
        assert!(bp.path.is_absolute());
        assert_eq!(bp.blueprint_dir(), dir.path());
    }
}
