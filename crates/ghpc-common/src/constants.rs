//! Reserved names, fixed directories and lookup tables.

/// Namespace of global variables in blueprint reference literals (`$(vars.x)`).
pub const GLOBAL_NAMESPACE: &str = "vars";

/// Root of global variables in native expressions (`var.x`).
pub const VAR_ROOT: &str = "var";

/// Root of module outputs in native expressions (`module.m.o`).
pub const MODULE_ROOT: &str = "module";

/// Directory staged files are copied to, relative to a deployment group.
pub const STAGING_DIR: &str = "../.ghpc/staged";

/// Name of the file-staging function.
pub const STAGE_FUNCTION: &str = "ghpc_stage";

/// Functions the expression evaluator can call.
pub const SUPPORTED_FUNCTIONS: &[&str] = &["flatten", "merge", STAGE_FUNCTION];

/// Number of hex characters of the path hash appended to staged file names.
pub const STAGED_HASH_LENGTH: usize = 10;

/// Basename used for staged paths whose own basename is degenerate.
pub const STAGED_FALLBACK_NAME: &str = "file";

/// Largest edit distance for which an unknown name gets a "did you mean" hint.
pub const HINT_MAX_DISTANCE: usize = 3;

/// Global variable holding the deployment name.
pub const DEPLOYMENT_NAME_VAR: &str = "deployment_name";

/// Global variable and module input holding resource labels.
pub const LABELS_VAR: &str = "labels";

/// Label recording the blueprint name.
pub const BLUEPRINT_LABEL: &str = "ghpc_blueprint";

/// Label recording the deployment name.
pub const DEPLOYMENT_LABEL: &str = "ghpc_deployment";

/// Per-module label recording the directory the module source lives in.
pub const ROLE_LABEL: &str = "ghpc_role";

/// Role of a module whose source has no enclosing directory.
pub const ROLE_FALLBACK: &str = "other";

/// Backend type whose `prefix` is derived from the deployment layout.
pub const GCS_BACKEND: &str = "gcs";

/// Description given to outputs synthesized for intergroup references.
pub const GENERATED_OUTPUT_DESCRIPTION: &str = "Generated output from module";

/// Built-in module sources that were relocated, with their replacements.
pub const MOVED_MODULES: &[(&str, &str)] = &[
    (
        "community/modules/scheduler/cloud-batch-job",
        "modules/scheduler/batch-job-template",
    ),
    (
        "community/modules/scheduler/cloud-batch-login-node",
        "modules/scheduler/batch-login-node",
    ),
    (
        "community/modules/scheduler/htcondor-configure",
        "community/modules/scheduler/htcondor-setup",
    ),
];

