//! Interpretation of YAML strings.
//!
//! - `((EXPR))` is a native expression; `\((EXPR))` escapes it.
//! - `$(REF)` anywhere in a string is a blueprint reference literal written
//!   in the blueprint namespace (`vars.x`, `module_id.output`); `\$(`
//!   escapes it. A string that is exactly one literal becomes that
//!   expression, mixed text becomes a string template.

use std::borrow::Cow;
use std::sync::LazyLock;

use ghpc_common::constants::{GLOBAL_NAMESPACE, MODULE_ROOT, VAR_ROOT};
use ghpc_common::error::{BlueprintError, Result};
use regex::Regex;

use crate::expression::Expression;
use crate::expression::ast::{Expr, Step, TemplatePart};
use crate::expression::lexer::tokenize;
use crate::expression::parser::parse_tokens;
use crate::reference::Reference;
use crate::value::Value;

static SIMPLE_VARIABLE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\$\((.*)\)$"));
static ANY_VARIABLE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\$\((.*)\)"));
static LITERAL_VARIABLE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\(\((.*)\)\)$"));
static LITERAL_SPLIT: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\(\(\s*([^.\s]+)\.(\S+?)\s*\)\)$"));
static DOTTED_PATH: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w-]*(\.[A-Za-z_][\w-]*)*$"));

pub(crate) fn is_match(re: &LazyLock<std::result::Result<Regex, regex::Error>>, s: &str) -> bool {
    re.as_ref().is_ok_and(|re| re.is_match(s))
}

fn captures(re: &LazyLock<std::result::Result<Regex, regex::Error>>, s: &str) -> Vec<String> {
    re.as_ref()
        .ok()
        .and_then(|re| re.captures(s))
        .map(|c| {
            c.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_owned()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

/// Returns `true` if `s` contains a `$(...)` reference literal.
#[must_use]
pub fn has_variable(s: &str) -> bool {
    is_match(&ANY_VARIABLE, s)
}

/// Returns `true` if `s` is exactly one `$(...)` reference literal.
#[must_use]
pub fn is_simple_variable(s: &str) -> bool {
    is_match(&SIMPLE_VARIABLE, s)
}

/// Returns `true` if `s` is a `((...))` expression literal.
#[must_use]
pub fn is_literal_variable(s: &str) -> bool {
    is_match(&LITERAL_VARIABLE, s)
}

/// Splits `((source.name))` into its source (`var`, a module) and name.
#[must_use]
pub fn identify_literal_variable(s: &str) -> Option<(String, String)> {
    match captures(&LITERAL_SPLIT, s).as_slice() {
        [source, name] => Some((source.clone(), name.clone())),
        _ => None,
    }
}

/// Contents of a `((...))` literal, trimmed.
#[must_use]
pub fn handle_literal_variable(s: &str) -> Option<String> {
    captures(&LITERAL_VARIABLE, s)
        .first()
        .map(|c| c.trim().to_owned())
}

/// Interprets a YAML string value.
///
/// # Errors
///
/// Returns an error for malformed `((...))` or `$(...)` contents.
pub fn parse_yaml_string(s: &str) -> Result<Value> {
    if s.len() >= 4 && s.starts_with("((") && s.ends_with("))") {
        return Ok(Value::Expression(Expression::parse(&s[2..s.len() - 2])?));
    }
    if s.starts_with(r"\((") && s.ends_with("))") {
        return Ok(Value::String(s[1..].to_owned()));
    }
    parse_blueprint_literal(s)
}

/// Escapes a plain string so [`parse_yaml_string`] reads it back unchanged.
#[must_use]
pub fn escape(s: &str) -> Cow<'_, str> {
    if s.len() >= 4 && s.starts_with("((") && s.ends_with("))") {
        return Cow::Owned(format!("\\{s}"));
    }
    if !s.contains("$(") {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 2);
    let mut rest = s;
    while let Some(i) = rest.find("$(") {
        let prefix = &rest[..i];
        let backslashes = prefix.len() - prefix.trim_end_matches('\\').len();
        out.push_str(prefix);
        out.push_str(&"\\".repeat(backslashes + 1));
        out.push_str("$(");
        rest = &rest[i + 2..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

enum Piece {
    Text(String),
    Expr(Expression),
}

/// Interprets `$(...)` literals in `s`.
///
/// # Errors
///
/// Returns an error when a `$(` has no closing parenthesis that ends a
/// valid expression, or when a reference is malformed.
pub fn parse_blueprint_literal(s: &str) -> Result<Value> {
    let mut pieces = Vec::new();
    for (i, line) in s.split('\n').enumerate() {
        if i > 0 {
            pieces.push(Piece::Text("\n".to_owned()));
        }
        tokenize_line(line.strip_suffix('\r').unwrap_or(line), &mut pieces)?;
    }
    let pieces = compact(pieces);
    Ok(match pieces.as_slice() {
        [] => Value::String(String::new()),
        [Piece::Text(t)] => Value::String(t.clone()),
        [Piece::Expr(e)] => Value::Expression(e.clone()),
        _ => {
            let parts = pieces
                .into_iter()
                .map(|p| match p {
                    Piece::Text(t) => TemplatePart::Literal(t),
                    Piece::Expr(e) => TemplatePart::Interp(e.ast().clone()),
                })
                .collect();
            Value::Expression(Expression::from_ast(Expr::Template(parts)))
        }
    })
}

fn tokenize_line(line: &str, pieces: &mut Vec<Piece>) -> Result<()> {
    let mut rest = line;
    while let Some(i) = rest.find("$(") {
        let prefix = &rest[..i];
        rest = &rest[i + 2..];
        let backslashes = prefix.len() - prefix.trim_end_matches('\\').len();
        let keep = prefix.len() - backslashes + backslashes / 2;
        pieces.push(Piece::Text(prefix[..keep].to_owned()));
        if backslashes % 2 == 1 {
            pieces.push(Piece::Text("$(".to_owned()));
            continue;
        }
        let (expr, after) = shortest_expression(rest).map_err(|e| match e {
            BlueprintError::ReferenceFormat { .. } => e,
            e => BlueprintError::expression(format!("{e}\n  {line}")),
        })?;
        pieces.push(Piece::Expr(expr));
        rest = after;
    }
    pieces.push(Piece::Text(rest.to_owned()));
    Ok(())
}

/// Parses the shortest prefix of `s` ending before a `)` that is a valid expression.
///
/// A dotted path closed by `)` cannot be extended, so its format error is final.
fn shortest_expression(s: &str) -> Result<(Expression, &str)> {
    let mut last_err = BlueprintError::expression("no closing parenthesis");
    for (i, _) in s.match_indices(')') {
        match blueprint_expression(&s[..i]) {
            Ok(e) => return Ok((e, &s[i + 1..])),
            Err(e) if is_match(&DOTTED_PATH, s[..i].trim()) => return Err(e),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Converts the contents of `$(...)` to an expression in the `var`/`module` namespace.
///
/// Dotted paths are references and must have a valid arity. The one
/// exception is `vars.NAME.ATTR`, read as attribute `ATTR` of global `NAME`.
fn blueprint_expression(text: &str) -> Result<Expression> {
    let trimmed = text.trim();
    if is_match(&DOTTED_PATH, trimmed) {
        let three_part_global = trimmed.starts_with(&format!("{GLOBAL_NAMESPACE}."))
            && trimmed.matches('.').count() == 2;
        if !three_part_global {
            return Ok(Reference::parse_textual(trimmed)?.as_expression());
        }
    }
    let mut ast = parse_tokens(&tokenize(text)?)?;
    let mut error = None;
    ast.walk_mut(&mut |node| {
        let Expr::Traversal(t) = node else {
            return;
        };
        if error.is_some() {
            return;
        }
        if !matches!(t.steps.first(), Some(Step::Attr(_))) {
            error = Some(BlueprintError::ReferenceFormat {
                text: Expr::Traversal(t.clone()).to_string(),
                reason: "expected vars.NAME or MODULE.NAME".to_owned(),
            });
            return;
        }
        if t.root == GLOBAL_NAMESPACE {
            VAR_ROOT.clone_into(&mut t.root);
        } else {
            let module = std::mem::replace(&mut t.root, MODULE_ROOT.to_owned());
            t.steps.insert(0, Step::Attr(module));
        }
    });
    if let Some(e) = error {
        return Err(e);
    }
    Expression::parse(&ast.to_string())
}

/// Drops empty text pieces and merges adjacent ones.
fn compact(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Text(t) if t.is_empty() => {}
            Piece::Text(t) => {
                if let Some(Piece::Text(prev)) = out.last_mut() {
                    prev.push_str(&t);
                } else {
                    out.push(Piece::Text(t));
                }
            }
            expr => out.push(expr),
        }
    }
    out
}
