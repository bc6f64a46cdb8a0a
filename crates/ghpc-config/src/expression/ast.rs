//! Abstract syntax tree of the expression language.
//!
//! The [`Display`](std::fmt::Display) implementation is the canonical
//! rendering: parsing it yields an equal tree.

use std::fmt;

use super::lexer::{escape_template_literal, format_number};

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// A number literal.
    Number(f64),
    /// A quoted string, possibly with `${...}` interpolations.
    Template(Vec<TemplatePart>),
    /// A named root followed by attribute and index steps (`var.x[0]`).
    Traversal(Traversal),
    /// Steps applied to a computed value (`merge(a, b).x`).
    Relative {
        /// The value being traversed.
        source: Box<Expr>,
        /// Steps applied to it.
        steps: Vec<Step>,
    },
    /// A function call.
    Call {
        /// Function name.
        name: String,
        /// Arguments in order.
        args: Vec<Expr>,
    },
    /// `[a, b]`
    Tuple(Vec<Expr>),
    /// `{k = v}`
    Object(Vec<(ObjectKey, Expr)>),
    /// `-x` / `!x`
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `a op b`
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `c ? a : b`
    Conditional {
        /// Condition.
        cond: Box<Expr>,
        /// Value when the condition holds.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// `(e)`
    Parens(Box<Expr>),
}

/// A piece of a quoted template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text, unescaped.
    Literal(String),
    /// `${expr}`
    Interp(Expr),
}

/// A rooted traversal such as `module.net.subnet`.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    /// Root identifier (`var`, `module`).
    pub root: String,
    /// Steps after the root.
    pub steps: Vec<Step>,
}

impl Traversal {
    /// Returns the name of attribute step `i`, if that step is an attribute.
    #[must_use]
    pub fn attr(&self, i: usize) -> Option<&str> {
        match self.steps.get(i) {
            Some(Step::Attr(name)) => Some(name),
            _ => None,
        }
    }
}

/// One traversal step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `.name`
    Attr(String),
    /// `[expr]`
    Index(Box<Expr>),
}

/// Key of an object constructor entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    /// A bare identifier key.
    Ident(String),
    /// A computed key, usually a quoted string.
    Expr(Expr),
}

impl ObjectKey {
    /// Builds the key for a literal map key, bare when it is an identifier.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut chars = name.chars();
        let is_ident = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(name, "true" | "false" | "null");
        if is_ident {
            Self::Ident(name.to_owned())
        } else {
            Self::Expr(Expr::string(name))
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `!`
    Not,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal | Self::NotEqual => 3,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Mod => 6,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

impl Expr {
    /// A plain string literal.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Template(vec![TemplatePart::Literal(s.into())])
    }

    /// A traversal rooted at `root` with attribute steps `attrs`.
    #[must_use]
    pub fn traversal<'a>(root: &str, attrs: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Traversal(Traversal {
            root: root.to_owned(),
            steps: attrs
                .into_iter()
                .map(|a| Step::Attr(a.to_owned()))
                .collect(),
        })
    }

    /// Calls `f` on this node and every node below it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) => {}
            Self::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Interp(e) = part {
                        e.walk(f);
                    }
                }
            }
            Self::Traversal(t) => walk_steps(&t.steps, f),
            Self::Relative { source, steps } => {
                source.walk(f);
                walk_steps(steps, f);
            }
            Self::Call { args, .. } | Self::Tuple(args) => {
                for a in args {
                    a.walk(f);
                }
            }
            Self::Object(items) => {
                for (k, v) in items {
                    if let ObjectKey::Expr(k) = k {
                        k.walk(f);
                    }
                    v.walk(f);
                }
            }
            Self::Unary { operand, .. } | Self::Parens(operand) => operand.walk(f),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(f);
                then.walk(f);
                otherwise.walk(f);
            }
        }
    }
}

impl Expr {
    /// Calls `f` on this node, then on every node below it, allowing edits.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Self)) {
        f(self);
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) => {}
            Self::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Interp(e) = part {
                        e.walk_mut(f);
                    }
                }
            }
            Self::Traversal(t) => walk_steps_mut(&mut t.steps, f),
            Self::Relative { source, steps } => {
                source.walk_mut(f);
                walk_steps_mut(steps, f);
            }
            Self::Call { args, .. } | Self::Tuple(args) => {
                for a in args {
                    a.walk_mut(f);
                }
            }
            Self::Object(items) => {
                for (k, v) in items {
                    if let ObjectKey::Expr(k) = k {
                        k.walk_mut(f);
                    }
                    v.walk_mut(f);
                }
            }
            Self::Unary { operand, .. } | Self::Parens(operand) => operand.walk_mut(f),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk_mut(f);
                rhs.walk_mut(f);
            }
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk_mut(f);
                then.walk_mut(f);
                otherwise.walk_mut(f);
            }
        }
    }
}

fn walk_steps_mut(steps: &mut [Step], f: &mut impl FnMut(&mut Expr)) {
    for step in steps {
        if let Step::Index(e) = step {
            e.walk_mut(f);
        }
    }
}

fn walk_steps<'a>(steps: &'a [Step], f: &mut impl FnMut(&'a Expr)) {
    for step in steps {
        if let Step::Index(e) = step {
            e.walk(f);
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step]) -> fmt::Result {
    for step in steps {
        match step {
            Step::Attr(name) => write!(f, ".{name}")?,
            Step::Index(e) => write!(f, "[{e}]")?,
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Template(parts) => {
                f.write_str("\"")?;
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => f.write_str(&escape_template_literal(s))?,
                        TemplatePart::Interp(e) => write!(f, "${{{e}}}")?,
                    }
                }
                f.write_str("\"")
            }
            Self::Traversal(t) => {
                f.write_str(&t.root)?;
                write_steps(f, &t.steps)
            }
            Self::Relative { source, steps } => {
                write!(f, "{source}")?;
                write_steps(f, steps)
            }
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Self::Tuple(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Self::Object(items) => {
                f.write_str("{")?;
                for (i, (k, v)) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match k {
                        ObjectKey::Ident(name) => write!(f, "{name} = {v}")?,
                        ObjectKey::Expr(e) => write!(f, "{e} = {v}")?,
                    }
                }
                f.write_str("}")
            }
            Self::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Not => write!(f, "!{operand}"),
            },
            Self::Binary { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => write!(f, "{cond} ? {then} : {otherwise}"),
            Self::Parens(e) => write!(f, "({e})"),
        }
    }
}
