//! Evaluation of expressions against resolved global variables.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use ghpc_common::constants::{MODULE_ROOT, STAGE_FUNCTION, SUPPORTED_FUNCTIONS, VAR_ROOT};
use ghpc_common::error::{BlueprintError, Result};

use super::ast::{BinaryOp, Expr, ObjectKey, Step, TemplatePart, Traversal, UnaryOp};
use super::lexer::format_number;
use crate::staging::{self, StagedFiles};
use crate::value::Value;

/// Bindings available to an evaluation.
///
/// Only `var` is bound. `ghpc_stage` always returns the staged destination
/// and records it when a staged-file table is attached.
#[derive(Debug)]
pub struct EvalContext<'a> {
    vars: &'a BTreeMap<String, Value>,
    blueprint_dir: &'a FsPath,
    staged: Option<&'a mut StagedFiles>,
}

impl<'a> EvalContext<'a> {
    /// Context binding `var` to `vars`.
    #[must_use]
    pub fn new(vars: &'a BTreeMap<String, Value>) -> Self {
        Self {
            vars,
            blueprint_dir: FsPath::new(""),
            staged: None,
        }
    }

    /// Records `ghpc_stage` calls in `staged`, resolving sources against `blueprint_dir`.
    #[must_use]
    pub fn with_staging(mut self, blueprint_dir: &'a FsPath, staged: &'a mut StagedFiles) -> Self {
        self.blueprint_dir = blueprint_dir;
        self.staged = Some(staged);
        self
    }
}

fn type_err(message: impl Into<String>) -> BlueprintError {
    BlueprintError::Type {
        message: message.into(),
    }
}

/// Evaluates every expression nested in `value`.
///
/// # Errors
///
/// Returns the first evaluation error.
pub fn eval_value(value: &Value, ctx: &mut EvalContext<'_>) -> Result<Value> {
    value.map_expressions(&mut |e| eval_expr(e.ast(), ctx))
}

/// Evaluates a syntax tree.
///
/// # Errors
///
/// Returns an error for unknown variables, module references, type
/// mismatches and unsupported functions.
pub fn eval_expr(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Value> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Template(parts) => eval_template(parts, ctx),
        Expr::Traversal(t) => eval_traversal(t, ctx),
        Expr::Relative { source, steps } => {
            let base = eval_expr(source, ctx)?;
            apply_steps(base, steps, ctx)
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| eval_expr(a, ctx))
                .collect::<Result<Vec<_>>>()?;
            call(name, args, ctx)
        }
        Expr::Tuple(items) => Ok(Value::List(
            items
                .iter()
                .map(|i| eval_expr(i, ctx))
                .collect::<Result<_>>()?,
        )),
        Expr::Object(items) => {
            let mut out = BTreeMap::new();
            for (k, v) in items {
                let key = match k {
                    ObjectKey::Ident(name) => name.clone(),
                    ObjectKey::Expr(e) => match eval_expr(e, ctx)? {
                        Value::String(s) => s,
                        Value::Number(n) => format_number(n),
                        other => {
                            return Err(type_err(format!(
                                "object key must be a string, got {}",
                                other.type_name()
                            )));
                        }
                    },
                };
                let _ = out.insert(key, eval_expr(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        Expr::Unary { op, operand } => match (op, eval_expr(operand, ctx)?) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (_, other) => Err(type_err(format!(
                "invalid operand type {} for unary operator",
                other.type_name()
            ))),
        },
        Expr::Binary { op, lhs, rhs } => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            binary(*op, l, r)
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => match eval_expr(cond, ctx)? {
            Value::Bool(true) => eval_expr(then, ctx),
            Value::Bool(false) => eval_expr(otherwise, ctx),
            other => Err(type_err(format!(
                "condition must be a bool, got {}",
                other.type_name()
            ))),
        },
        Expr::Parens(inner) => eval_expr(inner, ctx),
    }
}

fn eval_template(parts: &[TemplatePart], ctx: &mut EvalContext<'_>) -> Result<Value> {
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Interp(e) => match eval_expr(e, ctx)? {
                Value::String(s) => out.push_str(&s),
                Value::Number(n) => out.push_str(&format_number(n)),
                Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                other => {
                    return Err(type_err(format!(
                        "cannot include a {} value in a string template",
                        other.type_name()
                    )));
                }
            },
        }
    }
    Ok(Value::String(out))
}

fn eval_traversal(t: &Traversal, ctx: &mut EvalContext<'_>) -> Result<Value> {
    match t.root.as_str() {
        VAR_ROOT => {
            let Some(Step::Attr(name)) = t.steps.first() else {
                return Err(BlueprintError::expression(format!(
                    "invalid reference to global variables: {}",
                    Expr::Traversal(t.clone())
                )));
            };
            let value = ctx
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| BlueprintError::UnknownVariable { name: name.clone() })?;
            if value.has_expression() {
                return Err(BlueprintError::expression(format!(
                    "global variable {name:?} has not been evaluated"
                )));
            }
            apply_steps(value, &t.steps[1..], ctx)
        }
        MODULE_ROOT => Err(BlueprintError::expression(format!(
            "module output {} cannot be evaluated, its value is only known at deployment time",
            Expr::Traversal(t.clone())
        ))),
        other => Err(BlueprintError::UnknownVariable {
            name: other.to_owned(),
        }),
    }
}

fn apply_steps(mut value: Value, steps: &[Step], ctx: &mut EvalContext<'_>) -> Result<Value> {
    for step in steps {
        value = match step {
            Step::Attr(name) => get_key(value, name)?,
            Step::Index(e) => match eval_expr(e, ctx)? {
                Value::String(key) => get_key(value, &key)?,
                Value::Number(n) => get_index(value, n)?,
                other => {
                    return Err(type_err(format!(
                        "invalid index type {}",
                        other.type_name()
                    )));
                }
            },
        };
    }
    Ok(value)
}

fn get_key(value: Value, key: &str) -> Result<Value> {
    match value {
        Value::Object(mut m) => m
            .remove(key)
            .ok_or_else(|| BlueprintError::expression(format!("object has no attribute {key:?}"))),
        other => Err(type_err(format!(
            "cannot access attribute {key:?} of a {} value",
            other.type_name()
        ))),
    }
}

fn get_index(value: Value, n: f64) -> Result<Value> {
    match value {
        Value::List(mut items) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = n as usize;
            #[allow(clippy::cast_precision_loss)]
            let exact = n >= 0.0 && n.fract() == 0.0 && (idx as f64 - n).abs() < f64::EPSILON;
            if !exact || idx >= items.len() {
                return Err(BlueprintError::expression(format!(
                    "invalid index {} for list of length {}",
                    format_number(n),
                    items.len()
                )));
            }
            Ok(items.swap_remove(idx))
        }
        Value::Object(m) => get_key(Value::Object(m), &format_number(n)),
        other => Err(type_err(format!("cannot index a {} value", other.type_name()))),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(l == r)),
        BinaryOp::NotEqual => return Ok(Value::Bool(l != r)),
        BinaryOp::And | BinaryOp::Or => {
            return match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => {
                    Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b }))
                }
                (a, b) => Err(type_err(format!(
                    "logical operators require bools, got {} and {}",
                    a.type_name(),
                    b.type_name()
                ))),
            };
        }
        _ => {}
    }
    let (Value::Number(a), Value::Number(b)) = (&l, &r) else {
        return Err(type_err(format!(
            "arithmetic and comparison operators require numbers, got {} and {}",
            l.type_name(),
            r.type_name()
        )));
    };
    let (a, b) = (*a, *b);
    Ok(match op {
        BinaryOp::Add => Value::Number(a + b),
        BinaryOp::Sub => Value::Number(a - b),
        BinaryOp::Mul => Value::Number(a * b),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => {
            return Err(BlueprintError::expression("division by zero"));
        }
        BinaryOp::Div => Value::Number(a / b),
        BinaryOp::Mod => Value::Number(a % b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Equal | BinaryOp::NotEqual | BinaryOp::And | BinaryOp::Or => {
            return Err(BlueprintError::expression("unreachable operator"));
        }
    })
}

fn call(name: &str, args: Vec<Value>, ctx: &mut EvalContext<'_>) -> Result<Value> {
    match name {
        "flatten" => flatten(args),
        "merge" => merge(args),
        STAGE_FUNCTION => stage(args, ctx),
        other => Err(BlueprintError::UnsupportedFunction {
            name: other.to_owned(),
        }
        .with_hint(format!(
            "this context only supports following functions: {}",
            SUPPORTED_FUNCTIONS.join(", ")
        ))),
    }
}

fn flatten(args: Vec<Value>) -> Result<Value> {
    fn push_flat(v: Value, out: &mut Vec<Value>) {
        match v {
            Value::List(items) => items.into_iter().for_each(|i| push_flat(i, out)),
            other => out.push(other),
        }
    }
    let [arg] = <[Value; 1]>::try_from(args).map_err(|a| {
        type_err(format!("flatten takes exactly one argument, got {}", a.len()))
    })?;
    let items = match arg {
        Value::List(items) => items,
        other => {
            return Err(type_err(format!(
                "flatten argument must be a list, got {}",
                other.type_name()
            )));
        }
    };
    let mut out = Vec::new();
    for item in items {
        push_flat(item, &mut out);
    }
    Ok(Value::List(out))
}

fn merge(args: Vec<Value>) -> Result<Value> {
    let mut out = BTreeMap::new();
    for arg in args {
        match arg {
            Value::Null => {}
            Value::Object(m) => out.extend(m),
            other => {
                return Err(type_err(format!(
                    "merge arguments must be objects, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::Object(out))
}

fn stage(args: Vec<Value>, ctx: &mut EvalContext<'_>) -> Result<Value> {
    let src = match args.as_slice() {
        [Value::String(src)] => src.clone(),
        [other] => {
            return Err(type_err(format!(
                "{STAGE_FUNCTION} argument must be a string, got {}",
                other.type_name()
            )));
        }
        _ => {
            return Err(type_err(format!(
                "{STAGE_FUNCTION} takes exactly one argument, got {}",
                args.len()
            )));
        }
    };
    let dst = staging::destination(&src);
    if let Some(staged) = ctx.staged.as_deref_mut() {
        staged.record(ctx.blueprint_dir, &src, &dst);
    }
    Ok(Value::String(dst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn vars() -> BTreeMap<String, Value> {
        let mut vars = BTreeMap::new();
        let _ = vars.insert("a".to_owned(), Value::from("A"));
        let _ = vars.insert("n".to_owned(), Value::Number(3.0));
        let _ = vars.insert(
            "zones".to_owned(),
            Value::List(vec![Value::from("z1"), Value::from("z2")]),
        );
        let mut labels = BTreeMap::new();
        let _ = labels.insert("env".to_owned(), Value::from("prod"));
        let _ = vars.insert("labels".to_owned(), Value::Object(labels));
        vars
    }

    fn eval(src: &str) -> Result<Value> {
        let vars = vars();
        let mut ctx = EvalContext::new(&vars);
        Expression::parse(src).expect("should parse").eval(&mut ctx)
    }

    #[test]
    fn template_interpolates_variables() {
        assert_eq!(eval(r#""${var.a}_B""#).expect("eval"), Value::from("A_B"));
        assert_eq!(eval(r#""n=${var.n}""#).expect("eval"), Value::from("n=3"));
    }

    #[test]
    fn traversal_steps_into_values() {
        assert_eq!(eval("var.zones[1]").expect("eval"), Value::from("z2"));
        assert_eq!(eval("var.labels.env").expect("eval"), Value::from("prod"));
        assert_eq!(eval(r#"var.labels["env"]"#).expect("eval"), Value::from("prod"));
    }

    #[test]
    fn arithmetic_and_conditionals() {
        assert_eq!(eval("var.n * 2 + 1").expect("eval"), Value::Number(7.0));
        assert_eq!(
            eval(r#"var.n > 2 ? "big" : "small""#).expect("eval"),
            Value::from("big")
        );
        assert_eq!(eval("!(var.n == 3)").expect("eval"), Value::Bool(false));
    }

    #[test]
    fn flatten_and_merge() {
        assert_eq!(
            eval(r#"flatten([["a"], [["b"]], "c"])"#).expect("eval"),
            Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );
        let merged = eval(r#"merge(var.labels, {env = "dev", x = 1})"#).expect("eval");
        let obj = merged.as_object().expect("object");
        assert_eq!(obj["env"], Value::from("dev"));
        assert_eq!(obj["x"], Value::Number(1.0));
    }

    #[test]
    fn unknown_variable_is_reported() {
        let err = eval("var.missing").unwrap_err();
        assert!(matches!(err, BlueprintError::UnknownVariable { .. }), "got: {err}");
    }

    #[test]
    fn module_reference_cannot_be_evaluated() {
        let err = eval("module.net.subnet").unwrap_err();
        assert!(err.to_string().contains("module.net.subnet"), "got: {err}");
    }

    #[test]
    fn unsupported_function_has_hint() {
        let err = eval(r#"upper("a")"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unsupported function \"upper\""), "got: {msg}");
        assert!(msg.contains("flatten, merge, ghpc_stage"), "got: {msg}");
    }

    #[test]
    fn index_out_of_range() {
        let err = eval("var.zones[5]").unwrap_err();
        assert!(err.to_string().contains("invalid index 5"), "got: {err}");
    }

    #[test]
    fn stage_records_when_table_attached() {
        let vars = vars();
        let mut staged = StagedFiles::default();
        let dir = FsPath::new("/zebra");
        let e = Expression::parse(r#"ghpc_stage("zero/one.txt")"#).expect("should parse");
        let v = {
            let mut ctx = EvalContext::new(&vars).with_staging(dir, &mut staged);
            e.eval(&mut ctx).expect("eval")
        };
        let dst = v.as_str().expect("string").to_owned();
        assert!(dst.starts_with("../.ghpc/staged/one.txt_"), "got: {dst}");
        assert_eq!(staged.get("/zebra/zero/one.txt"), Some(dst.as_str()));
    }

    #[test]
    fn stage_without_table_does_not_record() {
        let v = eval(r#"ghpc_stage("a.sh")"#).expect("eval");
        assert!(v.as_str().is_some_and(|s| s.contains("a.sh_")));
    }
}
