//! Introspected module interfaces.
//!
//! Reading Terraform or Packer sources is not part of resolution; the
//! inputs and outputs of each module are supplied by a [`ModuleInfoSource`].

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::types::ModuleKind;
use serde::{Deserialize, Deserializer, Serialize};

/// One input variable of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarInfo {
    /// Variable name.
    pub name: String,
    /// Declared type, e.g. `string` or `list(string)`.
    #[serde(rename = "type", default)]
    pub type_: String,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `true` if the variable has no default.
    #[serde(default)]
    pub required: bool,
}

impl VarInfo {
    /// Returns `true` for list-typed inputs, which accumulate `use` values.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.type_.starts_with("list")
    }
}

/// One output of a module.
///
/// In YAML an output is either a bare name or a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputInfo {
    /// Output name.
    pub name: String,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the deployment tool should hide the value.
    #[serde(default)]
    pub sensitive: bool,
}

impl OutputInfo {
    /// A plain, non-sensitive output.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl<'de> Deserialize<'de> for OutputInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Full {
            name: String,
            #[serde(default)]
            description: Option<String>,
            #[serde(default)]
            sensitive: bool,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Full(Full),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(name) => Self::named(name),
            Raw::Full(f) => Self {
                name: f.name,
                description: f.description,
                sensitive: f.sensitive,
            },
        })
    }
}

/// Inputs and outputs of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Input variables.
    #[serde(default)]
    pub inputs: Vec<VarInfo>,
    /// Outputs.
    #[serde(default)]
    pub outputs: Vec<OutputInfo>,
}

impl ModuleInfo {
    /// Input named `name`.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&VarInfo> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Returns `true` if the module declares output `name`.
    #[must_use]
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }
}

/// Provider of module interfaces, keyed by module source and kind.
pub trait ModuleInfoSource {
    /// Interface of the module at `source`.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::ModuleInfoNotFound`] for unknown sources.
    fn module_info(&self, source: &str, kind: ModuleKind) -> Result<ModuleInfo>;
}

/// In-memory [`ModuleInfoSource`].
///
/// Entries without a kind match any kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, CatalogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    kind: ModuleKind,
    #[serde(flatten)]
    info: ModuleInfo,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Registers the interface of `source`.
    pub fn insert(&mut self, source: impl Into<String>, kind: ModuleKind, info: ModuleInfo) {
        let _ = self.modules.insert(source.into(), CatalogEntry { kind, info });
    }

    /// Builder form of [`ModuleCatalog::insert`].
    #[must_use]
    pub fn with(mut self, source: impl Into<String>, kind: ModuleKind, info: ModuleInfo) -> Self {
        self.insert(source, kind, info);
        self
    }

    /// Parses a catalog from YAML: a mapping from module source to
    /// `{kind, inputs, outputs}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match that shape.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &FsPath) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BlueprintError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), modules = catalog.modules.len(), "loaded module catalog");
        Ok(catalog)
    }
}

impl ModuleInfoSource for ModuleCatalog {
    fn module_info(&self, source: &str, kind: ModuleKind) -> Result<ModuleInfo> {
        match self.modules.get(source) {
            Some(entry) if entry.kind == ModuleKind::Unknown || entry.kind == kind => {
                Ok(entry.info.clone())
            }
            _ => Err(BlueprintError::ModuleInfoNotFound {
                source_path: source.to_owned(),
                kind,
            }),
        }
    }
}
