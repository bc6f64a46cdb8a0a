//! Domain primitive types used across the ghpc workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlueprintError;

/// Unique identifier of a module, unique across the whole blueprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a new module ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the ID is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Name of a deployment group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Creates a new group name from a string value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Deployment tool a module is written for.
///
/// A group's kind is never stored: it is derived from its modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleKind {
    /// Kind was not declared and has not been defaulted yet.
    #[default]
    Unknown,
    /// A Terraform module.
    Terraform,
    /// A Packer template.
    Packer,
}

impl ModuleKind {
    /// Returns the lowercase name used in blueprints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Terraform => "terraform",
            Self::Packer => "packer",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Terraform | Self::Packer => write!(f, "{}", self.as_str()),
        }
    }
}

impl FromStr for ModuleKind {
    type Err = BlueprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Unknown),
            "terraform" => Ok(Self::Terraform),
            "packer" => Ok(Self::Packer),
            other => Err(BlueprintError::InvalidModuleKind {
                kind: other.to_owned(),
            }),
        }
    }
}

impl Serialize for ModuleKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModuleKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_kind_parses_known_values() {
        assert_eq!("terraform".parse::<ModuleKind>().ok(), Some(ModuleKind::Terraform));
        assert_eq!("packer".parse::<ModuleKind>().ok(), Some(ModuleKind::Packer));
        assert_eq!("".parse::<ModuleKind>().ok(), Some(ModuleKind::Unknown));
    }

    #[test]
    fn module_kind_rejects_unknown_value() {
        let err = "ansible".parse::<ModuleKind>().unwrap_err();
        assert!(err.to_string().contains("ansible"), "got: {err}");
    }

    #[test]
    fn module_id_serializes_transparently() {
        let json = serde_json::to_string(&ModuleId::new("network1")).expect("serialize");
        assert_eq!(json, "\"network1\"");
    }
}
