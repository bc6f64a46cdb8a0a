//! Options controlling blueprint expansion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlueprintError;

/// How failures of the external validator layer are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationLevel {
    /// Validator failures abort the run.
    #[default]
    Error,
    /// Validator failures are reported and the run continues.
    Warning,
    /// Validators are not run.
    Ignore,
}

impl ValidationLevel {
    /// Returns the uppercase name used in blueprints and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = BlueprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(Self::Error),
            "WARNING" => Ok(Self::Warning),
            "IGNORE" => Ok(Self::Ignore),
            other => Err(BlueprintError::InvalidValidationLevel {
                level: other.to_owned(),
            }),
        }
    }
}

/// Caller-supplied options applied before the expansion pipeline runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpandOptions {
    /// Overrides the blueprint's validation level when set.
    pub validation_level: Option<ValidationLevel>,
    /// Global variable overrides in `name=value` form.
    pub cli_variables: Vec<String>,
}
