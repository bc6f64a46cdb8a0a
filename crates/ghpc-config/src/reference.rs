//! Structured references to global variables and module outputs.

use std::fmt;

use ghpc_common::constants::{GLOBAL_NAMESPACE, MODULE_ROOT, VAR_ROOT};
use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::types::{GroupName, ModuleId};

use crate::expression::Expression;
use crate::expression::ast::{Expr, Traversal};
use crate::value::Value;

/// A pointer to a global variable or to a named output of a module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    /// `true` for global variables.
    pub is_global: bool,
    /// Group qualifier of the textual three-component form.
    pub group: Option<GroupName>,
    /// Target module; `None` for global variables.
    pub module: Option<ModuleId>,
    /// Variable or output name.
    pub name: String,
}

impl Reference {
    /// Reference to global variable `name`.
    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            is_global: true,
            group: None,
            module: None,
            name: name.into(),
        }
    }

    /// Reference to output `name` of module `module`.
    #[must_use]
    pub fn module(module: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self {
            is_global: false,
            group: None,
            module: Some(module.into()),
            name: name.into(),
        }
    }

    /// Parses the dotted form used inside `$(...)`.
    ///
    /// `vars.NAME` is global, `MODULE.NAME` is a module output and
    /// `GROUP.MODULE.NAME` is a group-qualified module output.
    ///
    /// `vars.NAME.ATTR` is not a reference. Blueprint literals read that
    /// shape as attribute `ATTR` of global `NAME`.
    ///
    /// # Errors
    ///
    /// Returns a format error for `vars.NAME.ATTR` and for any other number
    /// of components.
    pub fn parse_textual(text: &str) -> Result<Self> {
        let components: Vec<&str> = text.split('.').collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(format_err(text, "empty reference component"));
        }
        match components.as_slice() {
            [GLOBAL_NAMESPACE, name] => Ok(Self::global(*name)),
            [GLOBAL_NAMESPACE, _, _] => Err(format_err(
                text,
                "global variable attributes are not references, expected vars.NAME",
            )),
            [module, name] => Ok(Self::module(*module, *name)),
            [group, module, name] => Ok(Self {
                group: Some(GroupName::new(*group)),
                ..Self::module(*module, *name)
            }),
            _ => Err(format_err(
                text,
                "expected vars.NAME, MODULE.NAME or GROUP.MODULE.NAME",
            )),
        }
    }

    /// Interprets a traversal rooted at `var` or `module`.
    ///
    /// Steps after the variable or output name are ignored.
    ///
    /// # Errors
    ///
    /// Returns a format error for other roots and for a root not immediately
    /// followed by attribute names.
    pub fn from_traversal(t: &Traversal) -> Result<Self> {
        let text = || Expr::Traversal(t.clone()).to_string();
        match t.root.as_str() {
            VAR_ROOT => {
                let name = t.attr(0).ok_or_else(|| {
                    format_err(&text(), "expected second component of global var reference to be a variable name")
                })?;
                Ok(Self::global(name))
            }
            MODULE_ROOT => {
                let module = t.attr(0).ok_or_else(|| {
                    format_err(&text(), "expected second component of module var reference to be a module name")
                })?;
                let name = t.attr(1).ok_or_else(|| {
                    format_err(&text(), "expected third component of module var reference to be a variable name")
                })?;
                Ok(Self::module(module, name))
            }
            other => Err(format_err(
                &text(),
                &format!("unexpected first component of reference: {other:?}"),
            )),
        }
    }

    /// Returns the target module, or an empty ID for global references.
    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module.clone().unwrap_or_default()
    }

    /// The traversal naming this reference in expressions.
    #[must_use]
    pub fn to_expr(&self) -> Expr {
        match &self.module {
            Some(m) if !self.is_global => Expr::traversal(MODULE_ROOT, [m.as_str(), self.name.as_str()]),
            _ => Expr::traversal(VAR_ROOT, [self.name.as_str()]),
        }
    }

    /// This reference as an expression.
    #[must_use]
    pub fn as_expression(&self) -> Expression {
        Expression::from_ast(self.to_expr())
    }

    /// This reference as an expression value.
    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Expression(self.as_expression())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

fn format_err(text: &str, reason: &str) -> BlueprintError {
    BlueprintError::ReferenceFormat {
        text: text.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::lexer::tokenize;
    use crate::expression::parser::parse_tokens;

    fn traversal(src: &str) -> Traversal {
        let tokens = tokenize(src).expect("should tokenize");
        match parse_tokens(&tokens).expect("should parse") {
            Expr::Traversal(t) => t,
            other => panic!("expected traversal, got {other:?}"),
        }
    }

    #[test]
    fn textual_global() {
        let r = Reference::parse_textual("vars.project_id").expect("should parse");
        assert_eq!(r, Reference::global("project_id"));
    }

    #[test]
    fn textual_module() {
        let r = Reference::parse_textual("network1.subnetwork_name").expect("should parse");
        assert_eq!(r, Reference::module("network1", "subnetwork_name"));
        assert!(r.group.is_none());
    }

    #[test]
    fn textual_group_qualified() {
        let r = Reference::parse_textual("primary.network1.subnetwork_name").expect("should parse");
        assert_eq!(r.group, Some(GroupName::new("primary")));
        assert_eq!(r.module, Some(ModuleId::new("network1")));
        assert_eq!(r.name, "subnetwork_name");
        assert!(!r.is_global);
    }

    #[test]
    fn textual_bad_arity() {
        for text in ["project_id", "a.b.c.d"] {
            let err = Reference::parse_textual(text).unwrap_err();
            assert!(err.to_string().contains(text), "got: {err}");
        }
    }

    #[test]
    fn textual_global_attribute_is_rejected() {
        let err = Reference::parse_textual("vars.network.name").unwrap_err();
        assert!(
            matches!(&err, BlueprintError::ReferenceFormat { text, .. } if text == "vars.network.name"),
            "got: {err}"
        );
    }

    #[test]
    fn traversal_global_ignores_trailing_steps() {
        let r = Reference::from_traversal(&traversal("var.zones[0].name")).expect("should parse");
        assert_eq!(r, Reference::global("zones"));
    }

    #[test]
    fn traversal_module() {
        let r = Reference::from_traversal(&traversal("module.net.subnet.id")).expect("should parse");
        assert_eq!(r, Reference::module("net", "subnet"));
    }

    #[test]
    fn traversal_rejects_bare_and_indexed_roots() {
        for src in ["var", "module", "var[\"x\"]", "module.net", "module.net[0]"] {
            let err = Reference::from_traversal(&traversal(src)).unwrap_err();
            assert!(
                matches!(err, BlueprintError::ReferenceFormat { .. }),
                "{src}: got {err}"
            );
        }
    }

    #[test]
    fn traversal_rejects_other_roots() {
        let err = Reference::from_traversal(&traversal("local.x")).unwrap_err();
        assert!(err.to_string().contains("unexpected first component"), "got: {err}");
    }

    #[test]
    fn display_uses_expression_namespace() {
        assert_eq!(Reference::global("a").to_string(), "var.a");
        assert_eq!(Reference::module("m", "o").to_string(), "module.m.o");
    }
}
