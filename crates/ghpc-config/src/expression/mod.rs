//! The blueprint expression language.
//!
//! A Terraform-style subset: literals, templates, traversals, calls,
//! tuples, objects and operators. Expressions are written with
//! `var.NAME` for global variables and `module.ID.OUTPUT` for module
//! outputs; any other traversal root is rejected at parse time.
//!
//! An [`Expression`] is identified by its canonical rendering: two
//! expressions are equal exactly when they render the same.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::hash::{Hash, Hasher};

use ghpc_common::error::Result;

use self::ast::Expr;
use self::eval::EvalContext;
use self::lexer::Token;
use crate::reference::Reference;
use crate::value::Value;

/// A parsed, unevaluated expression.
#[derive(Debug, Clone)]
pub struct Expression {
    text: String,
    ast: Expr,
}

impl Expression {
    /// Parses an expression in the `var.`/`module.` namespace.
    ///
    /// # Errors
    ///
    /// Returns an error on lexing or syntax errors, and a reference format
    /// error for traversals that do not name a variable or module output.
    pub fn parse(src: &str) -> Result<Self> {
        let tokens = lexer::tokenize(src)?;
        Self::from_tokens(&tokens)
    }

    /// Parses an already tokenized expression.
    ///
    /// # Errors
    ///
    /// Same as [`Expression::parse`].
    pub fn from_tokens(tokens: &[Token]) -> Result<Self> {
        let ast = parser::parse_tokens(tokens)?;
        let mut result: Result<()> = Ok(());
        ast.walk(&mut |node| {
            if result.is_err() {
                return;
            }
            if let Expr::Traversal(t) = node {
                result = Reference::from_traversal(t).map(|_| ());
            }
        });
        result?;
        Ok(Self::from_ast(ast))
    }

    /// Wraps a syntax tree built in code.
    #[must_use]
    pub fn from_ast(ast: Expr) -> Self {
        Self {
            text: ast.to_string(),
            ast,
        }
    }

    /// Builds `name(args...)`.
    #[must_use]
    pub fn function_call(name: &str, args: &[Value]) -> Self {
        Self::from_ast(Expr::Call {
            name: name.to_owned(),
            args: args.iter().map(Value::to_expr).collect(),
        })
    }

    /// Canonical source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Syntax tree.
    #[must_use]
    pub const fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Token stream of the canonical text.
    ///
    /// # Errors
    ///
    /// Returns an error only if the canonical text fails to lex, which
    /// indicates a rendering bug.
    pub fn tokens(&self) -> Result<Vec<Token>> {
        lexer::tokenize(&self.text)
    }

    /// Every reference in the expression. Order is not meaningful and
    /// duplicates are kept.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.ast.walk(&mut |node| {
            if let Expr::Traversal(t) = node {
                if let Ok(r) = Reference::from_traversal(t) {
                    refs.push(r);
                }
            }
        });
        refs
    }

    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown variables, module references, type
    /// mismatches and unsupported functions.
    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<Value> {
        eval::eval_expr(&self.ast, ctx)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
