//! Unified error types for the ghpc workspace.
//!
//! Every failure of the resolution engine is a [`BlueprintError`]. Errors are
//! located with [`BlueprintError::at`], decorated with suggestions with
//! [`BlueprintError::with_hint`], and collected by [`Errors`] when a pass
//! reports every independent problem at once.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::path::Path;
use crate::types::{GroupName, ModuleId, ModuleKind};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML serialization or deserialization failed.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },

    /// A reference does not follow one of the accepted shapes.
    #[error("unexpected reference format {text:?}: {reason}")]
    ReferenceFormat {
        /// Offending reference text.
        text: String,
        /// What was expected instead.
        reason: String,
    },

    /// An expression could not be lexed, parsed, or evaluated.
    #[error("{message}")]
    Expression {
        /// Description of the failure.
        message: String,
    },

    /// A function other than the supported ones was called.
    #[error("unsupported function {name:?}")]
    UnsupportedFunction {
        /// Name of the called function.
        name: String,
    },

    /// A reference names a module that does not exist.
    #[error("invalid module id: \"{id}\"")]
    UnknownModule {
        /// The unknown module ID.
        id: ModuleId,
    },

    /// A deployment group lookup failed.
    #[error("invalid group name: \"{name}\"")]
    UnknownGroup {
        /// The missing group.
        name: String,
    },

    /// A reference names a global variable that does not exist.
    #[error("could not find source of variable: {name:?} is not a global variable")]
    UnknownVariable {
        /// The unknown variable name.
        name: String,
    },

    /// A module reference names an output the module does not have.
    #[error("output not found for a variable: module {module} did not have output {output}")]
    NoOutput {
        /// Referenced module.
        module: ModuleId,
        /// Missing output name.
        output: String,
    },

    /// A global variable expression references something other than a global variable.
    #[error("non-global variable referenced in expression")]
    NonGlobalReference,

    /// The global variables reference each other in a cycle.
    #[error("cyclic dependency detected: {from:?} -> {to:?}")]
    CyclicDependency {
        /// Variable being evaluated.
        from: String,
        /// Variable it depends on, already on the evaluation stack.
        to: String,
    },

    /// A module references a module of a later deployment group.
    #[error("references to outputs from other groups must be to earlier groups: {id} is in a later group")]
    IntergroupOrder {
        /// The referenced module.
        id: ModuleId,
    },

    /// A module references a Packer module.
    #[error("Packer modules cannot be used by other modules: {id}")]
    PackerReference {
        /// The referenced Packer module.
        id: ModuleId,
    },

    /// An identifier that must be unique was declared twice.
    #[error("{kind} must be unique: {name} used more than once")]
    Duplicate {
        /// Kind of identifier (`module IDs`, `group names`).
        kind: &'static str,
        /// The repeated identifier.
        name: String,
    },

    /// A deployment group has no name.
    #[error("group name must be set for each deployment group")]
    EmptyGroupName,

    /// A deployment group name contains forbidden characters.
    #[error("invalid character(s) found in group name \"{name}\"")]
    InvalidGroupName {
        /// The offending name.
        name: GroupName,
    },

    /// A deployment group contains no modules.
    #[error("deployment group {group} must contain at least one module")]
    EmptyGroup {
        /// The empty group.
        group: GroupName,
    },

    /// A deployment group mixes Terraform and Packer modules.
    #[error(
        "mixing modules of differing kinds in a deployment group is not supported: deployment group {group}, got: {got}, wanted: {wanted}"
    )]
    MixedModules {
        /// The offending group.
        group: GroupName,
        /// Kind of the first module that differs.
        got: ModuleKind,
        /// Kind established by earlier modules.
        wanted: ModuleKind,
    },

    /// A Packer group has more than one module.
    #[error("Packer groups must contain exactly one module: deployment group {group} has {count}")]
    PackerGroupSize {
        /// The offending group.
        group: GroupName,
        /// Number of modules found.
        count: usize,
    },

    /// A module has no ID.
    #[error("a module id cannot be empty")]
    EmptyModuleId,

    /// A module has no source.
    #[error("a module source cannot be empty")]
    EmptyModuleSource,

    /// A module kind is not one of the supported kinds.
    #[error("a module kind is invalid: {kind:?}, kind must be \"packer\" or \"terraform\" or removed from YAML")]
    InvalidModuleKind {
        /// The rejected kind.
        kind: String,
    },

    /// A module ID collides with the global variable namespace.
    #[error("module id \"{id}\" is reserved for global variables")]
    ReservedModuleId {
        /// The reserved ID.
        id: ModuleId,
    },

    /// A module source points at a built-in module that was relocated.
    #[error(
        "a module has moved. {old} has been replaced with {new}. Please update the source in your blueprint and try again"
    )]
    MovedModule {
        /// Source used by the blueprint.
        old: String,
        /// Replacement source.
        new: String,
    },

    /// A setting name addresses a sub-field.
    #[error(
        "a setting name contains a period, which is not supported; variable subfields cannot be set independently in a blueprint."
    )]
    SettingWithPeriod,

    /// A setting name is not an identifier.
    #[error(
        "a setting name must begin with a non-numeric character and all characters must be either letters, numbers, dashes ('-') or underscores ('_')."
    )]
    SettingInvalidChar,

    /// A setting is not an input of the module.
    #[error("a setting was added that is not found in the module")]
    UnknownSetting,

    /// A declared output is not an output of the module.
    #[error("requested output was not found in the module: {output}")]
    InvalidOutput {
        /// The undeclared output.
        output: String,
    },

    /// A required module input has neither a value nor a same-named global variable.
    #[error("a required setting is missing from a module: Module.ID: {id} Setting: {setting}")]
    MissingSetting {
        /// The module lacking the setting.
        id: ModuleId,
        /// The required input.
        setting: String,
    },

    /// A value has the wrong type for where it is used.
    #[error("type error: {message}")]
    Type {
        /// Description of the mismatch.
        message: String,
    },

    /// No introspected information exists for a module source.
    #[error("module info not found for source {source_path:?} of kind {kind}")]
    ModuleInfoNotFound {
        /// Module source.
        source_path: String,
        /// Module kind.
        kind: ModuleKind,
    },

    /// The validation level is not one of the accepted names.
    #[error("invalid validation level {level:?} (\"ERROR\", \"WARNING\", \"IGNORE\")")]
    InvalidValidationLevel {
        /// The rejected level.
        level: String,
    },

    /// The `deployment_name` variable is missing or unusable.
    #[error("deployment_name must be a string and cannot be empty, cause: {cause}")]
    DeploymentName {
        /// Why the name was rejected.
        cause: &'static str,
    },

    /// A CLI variable override is not in `name=value` form.
    #[error("invalid format: '{item}' should follow the 'name=value' format")]
    CliVariableFormat {
        /// The offending item.
        item: String,
    },

    /// An error with a suggestion attached.
    #[error("{source} - {hint}")]
    Hint {
        /// Underlying error.
        source: Box<BlueprintError>,
        /// Suggestion for the user.
        hint: String,
    },

    /// An error located in the blueprint document.
    #[error("{path}: {source}")]
    At {
        /// Location of the problem.
        path: Path,
        /// Underlying error.
        source: Box<BlueprintError>,
    },

    /// Several independent errors.
    #[error("{0}")]
    Multiple(Errors),
}

impl BlueprintError {
    /// Locates this error in the blueprint document.
    #[must_use]
    pub fn at(self, path: impl Into<Path>) -> Self {
        Self::At {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Attaches a suggestion to this error.
    #[must_use]
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self::Hint {
            source: Box::new(self),
            hint: hint.into(),
        }
    }

    /// Shorthand for [`BlueprintError::Expression`].
    #[must_use]
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    /// Returns the innermost error, looking through location and hint wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::At { source, .. } | Self::Hint { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the outermost location attached to this error, if any.
    #[must_use]
    pub const fn path(&self) -> Option<&Path> {
        match self {
            Self::At { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns the hint attached to this error, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Hint { hint, .. } => Some(hint.as_str()),
            Self::At { source, .. } => source.hint(),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BlueprintError>;

/// Accumulator for independent errors.
///
/// Identical messages are reported once; nested [`BlueprintError::Multiple`]
/// values are flattened.
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<BlueprintError>,
}

impl Errors {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Adds an error.
    pub fn add(&mut self, err: BlueprintError) -> &mut Self {
        match err {
            BlueprintError::Multiple(inner) => {
                for e in inner.errors {
                    self.add_dedup(e);
                }
            }
            other => self.add_dedup(other),
        }
        self
    }

    /// Adds an error located at `path`.
    pub fn at(&mut self, path: impl Into<Path>, err: BlueprintError) -> &mut Self {
        match err {
            BlueprintError::Multiple(inner) => {
                let path = path.into();
                for e in inner.errors {
                    self.add_dedup(e.at(path.clone()));
                }
                self
            }
            other => self.add(other.at(path)),
        }
    }

    /// Records the error of `result`, if any, and returns its value otherwise.
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                let _ = self.add(e);
                None
            }
        }
    }

    /// Returns `true` if any error was recorded.
    #[must_use]
    pub fn any(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the recorded errors.
    pub fn iter(&self) -> impl Iterator<Item = &BlueprintError> {
        self.errors.iter()
    }

    /// Converts into `Ok(())`, the single error, or [`BlueprintError::Multiple`].
    ///
    /// # Errors
    ///
    /// Returns an error if at least one error was recorded.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(BlueprintError::Multiple(self)),
        }
    }

    fn add_dedup(&mut self, err: BlueprintError) {
        let msg = err.to_string();
        if self.errors.iter().all(|e| e.to_string() != msg) {
            self.errors.push(err);
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors encountered:", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n{e}")?;
        }
        Ok(())
    }
}
