//! Staged files: `ghpc_stage(path)` copies a file next to the deployment.
//!
//! The destination depends only on the literal source string, so staging is
//! deterministic and idempotent. Inside module settings the call is
//! resolved by partial evaluation: only the `ghpc_stage(...)` sub-expression
//! is evaluated and replaced by its result, the rest of the expression is
//! left for the deployment tool.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use ghpc_common::constants::{
    STAGE_FUNCTION, STAGED_FALLBACK_NAME, STAGED_HASH_LENGTH, STAGING_DIR,
};
use ghpc_common::error::{BlueprintError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::expression::Expression;
use crate::expression::ast::{Expr, TemplatePart};
use crate::expression::eval::EvalContext;
use crate::expression::lexer::Token;
use crate::value::Value;

/// Mapping from absolute source path to destination relative to a deployment group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StagedFiles {
    files: BTreeMap<String, String>,
}

impl StagedFiles {
    /// Records that `src`, relative to `blueprint_dir`, is staged at `dst`.
    pub fn record(&mut self, blueprint_dir: &FsPath, src: &str, dst: &str) {
        let abs = if src.starts_with('/') || blueprint_dir.as_os_str().is_empty() {
            clean(src)
        } else {
            clean(&format!("{}/{src}", blueprint_dir.to_string_lossy()))
        };
        tracing::debug!(src = %abs, dst, "staging file");
        let _ = self.files.insert(abs, dst.to_owned());
    }

    /// Destination of the staged source `abs_src`.
    #[must_use]
    pub fn get(&self, abs_src: &str) -> Option<&str> {
        self.files.get(abs_src).map(String::as_str)
    }

    /// Iterates `(source, destination)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of staged files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Destination of `src` under the staging directory.
///
/// The name is the basename of `src` followed by the first hex characters
/// of the SHA-256 of `src` itself, not of the file contents.
#[must_use]
pub fn destination(src: &str) -> String {
    let digest = Sha256::digest(src.as_bytes());
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let name = match basename(src) {
        "." | ".." | "/" => STAGED_FALLBACK_NAME,
        other => other,
    };
    format!("{STAGING_DIR}/{name}_{}", &hash[..STAGED_HASH_LENGTH])
}

fn basename(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Lexically normalizes a slash-separated path.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    let _ = parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Finds the `)` closing the `(` at `open`.
fn closing_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok {
            Token::OParen => depth += 1,
            Token::CParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Replaces every `ghpc_stage(...)` call in `expr` by the staged destination.
///
/// Returns `None` when `expr` does not call the function.
///
/// # Errors
///
/// Returns an error if a call argument references anything but global
/// variables, does not evaluate to a string, or has unbalanced parentheses.
pub fn stage_expression(expr: &Expression, ctx: &mut EvalContext<'_>) -> Result<Option<Value>> {
    let tokens = expr.tokens()?;
    let stage = Token::Ident(STAGE_FUNCTION.to_owned());
    let mut out = Vec::with_capacity(tokens.len());
    let mut replaced = false;
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] != stage || tokens.get(i + 1) != Some(&Token::OParen) {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }
        let end = closing_paren(&tokens, i + 1).ok_or_else(|| {
            BlueprintError::expression(format!("unbalanced parentheses in {STAGE_FUNCTION} call"))
        })?;
        let call = Expression::from_tokens(&tokens[i..=end])?;
        if call.references().iter().any(|r| !r.is_global) {
            return Err(BlueprintError::expression(format!(
                "{STAGE_FUNCTION} argument can only reference global variables: {call}"
            )));
        }
        let Value::String(dst) = call.eval(ctx)? else {
            return Err(BlueprintError::Type {
                message: format!("{STAGE_FUNCTION} must produce a string"),
            });
        };
        out.push(Token::OQuote);
        if !dst.is_empty() {
            out.push(Token::QuotedLit(dst));
        }
        out.push(Token::CQuote);
        replaced = true;
        i = end + 1;
    }
    if !replaced {
        return Ok(None);
    }
    let staged = Expression::from_tokens(&out)?;
    Ok(Some(match staged.ast() {
        Expr::Template(parts) if parts.iter().all(|p| matches!(p, TemplatePart::Literal(_))) => {
            let text: String = parts
                .iter()
                .filter_map(|p| match p {
                    TemplatePart::Literal(s) => Some(s.as_str()),
                    TemplatePart::Interp(_) => None,
                })
                .collect();
            Value::String(text)
        }
        _ => Value::Expression(staged),
    }))
}

/// Applies [`stage_expression`] to every expression nested in `value`.
///
/// # Errors
///
/// Propagates errors of [`stage_expression`].
pub fn stage_value(value: &Value, ctx: &mut EvalContext<'_>) -> Result<Value> {
    value.map_expressions(&mut |e| {
        Ok(stage_expression(e, ctx)?.unwrap_or_else(|| Value::Expression(e.clone())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars() -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    #[test]
    fn destination_uses_basename_and_hash() {
        assert_eq!(destination("zero"), "../.ghpc/staged/zero_f9194e73f9");
        assert_eq!(destination("zero/one.txt"), "../.ghpc/staged/one.txt_b89f5891be");
        assert_eq!(destination("./../../two.gif"), "../.ghpc/staged/two.gif_213dffc50f");
        assert_eq!(destination("/root/abs.txt"), "../.ghpc/staged/abs.txt_135bff213a");
    }

    #[test]
    fn destination_sanitizes_degenerate_names() {
        assert_eq!(destination("."), "../.ghpc/staged/file_cdb4ee2aea");
        assert_eq!(destination(".."), "../.ghpc/staged/file_5ec1f7e700");
        assert!(destination("/").starts_with("../.ghpc/staged/file_"));
    }

    #[test]
    fn record_resolves_against_blueprint_dir() {
        let mut staged = StagedFiles::default();
        let dir = FsPath::new("/zebra");
        staged.record(dir, "zero/one.txt", &destination("zero/one.txt"));
        staged.record(dir, "./../../two.gif", &destination("./../../two.gif"));
        staged.record(dir, "/root/abs.txt", &destination("/root/abs.txt"));
        let got: Vec<&str> = staged.iter().map(|(src, _)| src).collect();
        assert_eq!(got, vec!["/root/abs.txt", "/two.gif", "/zebra/zero/one.txt"]);
    }

    #[test]
    fn clean_handles_relative_parents() {
        assert_eq!(clean("a/../../b"), "../b");
        assert_eq!(clean("./"), ".");
        assert_eq!(clean("/a/./b/"), "/a/b");
    }

    #[test]
    fn staging_twice_is_idempotent() {
        let mut staged = StagedFiles::default();
        let dir = FsPath::new("/zebra");
        let first = destination("zero/one.txt");
        staged.record(dir, "zero/one.txt", &first);
        let second = destination("zero/one.txt");
        staged.record(dir, "zero/one.txt", &second);
        assert_eq!(first, second);
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn stage_expression_replaces_call_only() {
        let vars = no_vars();
        let mut staged = StagedFiles::default();
        let dir = FsPath::new("/zebra");
        let e = Expression::parse(r#"merge(module.net.meta, {script = ghpc_stage("zero/one.txt")})"#)
            .expect("should parse");
        let got = {
            let mut ctx = EvalContext::new(&vars).with_staging(dir, &mut staged);
            stage_expression(&e, &mut ctx).expect("should stage")
        };
        let Some(Value::Expression(got)) = got else {
            panic!("expected expression, got {got:?}");
        };
        assert_eq!(
            got.text(),
            r#"merge(module.net.meta, {script = "../.ghpc/staged/one.txt_b89f5891be"})"#
        );
        assert_eq!(
            staged.get("/zebra/zero/one.txt"),
            Some("../.ghpc/staged/one.txt_b89f5891be")
        );
    }

    #[test]
    fn stage_expression_collapses_to_string() {
        let vars = no_vars();
        let mut ctx = EvalContext::new(&vars);
        let e = Expression::parse(r#"ghpc_stage("a.sh")"#).expect("should parse");
        let got = stage_expression(&e, &mut ctx).expect("should stage");
        assert_eq!(got, Some(Value::from("../.ghpc/staged/a.sh_36477ea265")));
    }

    #[test]
    fn stage_expression_uses_global_variables() {
        let mut vars = no_vars();
        let _ = vars.insert("script".to_owned(), Value::from("a.sh"));
        let mut ctx = EvalContext::new(&vars);
        let e = Expression::parse("ghpc_stage(var.script)").expect("should parse");
        let got = stage_expression(&e, &mut ctx).expect("should stage");
        assert_eq!(got, Some(Value::from("../.ghpc/staged/a.sh_36477ea265")));
    }

    #[test]
    fn stage_expression_rejects_module_references() {
        let vars = no_vars();
        let mut ctx = EvalContext::new(&vars);
        let e = Expression::parse("ghpc_stage(module.a.path)").expect("should parse");
        let err = stage_expression(&e, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("only reference global variables"), "got: {err}");
    }

    #[test]
    fn stage_expression_ignores_other_expressions() {
        let vars = no_vars();
        let mut ctx = EvalContext::new(&vars);
        let e = Expression::parse("module.a.path").expect("should parse");
        assert_eq!(stage_expression(&e, &mut ctx).expect("ok"), None);
    }
}
