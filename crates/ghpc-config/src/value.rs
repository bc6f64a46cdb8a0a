//! Setting values: literals or unevaluated expressions.

use std::collections::BTreeMap;

use ghpc_common::error::{BlueprintError, Result};
use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::expression::Expression;
use crate::expression::ast::{Expr, ObjectKey};
use crate::literal;
use crate::reference::Reference;

/// A blueprint value.
///
/// Expressions may appear anywhere inside lists and objects; a value with
/// no expression anywhere is fully evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<Value>),
    /// A string-keyed object.
    Object(BTreeMap<String, Value>),
    /// An unevaluated expression.
    Expression(Expression),
}

impl Value {
    /// Returns the expression if this value is one.
    #[must_use]
    pub const fn as_expression(&self) -> Option<&Expression> {
        match self {
            Self::Expression(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the string if this value is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object entries if this value is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value's type, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Expression(_) => "expression",
        }
    }

    /// Calls `f` on this value and every value nested in it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        match self {
            Self::List(items) => items.iter().for_each(|v| v.walk(f)),
            Self::Object(items) => items.values().for_each(|v| v.walk(f)),
            _ => {}
        }
    }

    /// Rebuilds the value bottom-up, replacing every expression with the result of `f`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn map_expressions(&self, f: &mut impl FnMut(&Expression) -> Result<Self>) -> Result<Self> {
        Ok(match self {
            Self::Expression(e) => f(e)?,
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|v| v.map_expressions(f))
                    .collect::<Result<_>>()?,
            ),
            Self::Object(items) => Self::Object(
                items
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.map_expressions(f)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Returns `true` if an expression appears anywhere in this value.
    #[must_use]
    pub fn has_expression(&self) -> bool {
        let mut found = false;
        self.walk(&mut |v| found |= matches!(v, Self::Expression(_)));
        found
    }

    /// Every reference of every expression inside this value.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.walk(&mut |v| {
            if let Self::Expression(e) = v {
                refs.extend(e.references());
            }
        });
        refs
    }

    /// Converts the value to an expression tree producing it.
    #[must_use]
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Null => Expr::Null,
            Self::Bool(b) => Expr::Bool(*b),
            Self::Number(n) => Expr::Number(*n),
            Self::String(s) => Expr::string(s.clone()),
            Self::List(items) => Expr::Tuple(items.iter().map(Self::to_expr).collect()),
            Self::Object(items) => Expr::Object(
                items
                    .iter()
                    .map(|(k, v)| (ObjectKey::from_name(k), v.to_expr()))
                    .collect(),
            ),
            Self::Expression(e) => e.ast().clone(),
        }
    }

    /// Builds a value from parsed YAML, interpreting `((...))` and `$(...)` strings.
    ///
    /// # Errors
    ///
    /// Returns an error for non-string mapping keys or malformed embedded expressions.
    pub fn from_yaml(y: serde_yaml::Value) -> Result<Self> {
        Ok(match y {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => Self::Number(n.as_f64().ok_or_else(|| {
                BlueprintError::Type {
                    message: format!("number {n} cannot be represented"),
                }
            })?),
            serde_yaml::Value::String(s) => literal::parse_yaml_string(&s)?,
            serde_yaml::Value::Sequence(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::from_yaml)
                    .collect::<Result<_>>()?,
            ),
            serde_yaml::Value::Mapping(m) => {
                let mut out = BTreeMap::new();
                for (k, v) in m {
                    let serde_yaml::Value::String(key) = k else {
                        return Err(BlueprintError::Type {
                            message: format!("object keys must be strings, got {k:?}"),
                        });
                    };
                    let _ = out.insert(key, Self::from_yaml(v)?);
                }
                Self::Object(out)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value)?,
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(items: BTreeMap<String, Self>) -> Self {
        Self::Object(items)
    }
}

impl From<Expression> for Value {
    fn from(e: Expression) -> Self {
        Self::Expression(e)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(&literal::escape(s)),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (k, v) in items {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Expression(e) => serializer.serialize_str(&format!("(({e}))")),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Self::from_yaml(raw).map_err(D::Error::custom)
    }
}
