//! Dependency-ordered evaluation of global variables.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::path::Path;

use crate::dict::Dict;
use crate::expression::eval::{EvalContext, eval_value};
use crate::staging::StagedFiles;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unvisited,
    InProgress,
    Done,
}

struct Evaluator<'a> {
    vars: &'a Dict,
    state: BTreeMap<String, State>,
    resolved: BTreeMap<String, Value>,
    staging: Option<(&'a FsPath, &'a mut StagedFiles)>,
}

impl Evaluator<'_> {
    fn visit(&mut self, name: &str) -> Result<()> {
        let path = Path::root().vars().dot(name);
        let _ = self.state.insert(name.to_owned(), State::InProgress);
        let value = self.vars.get(name);
        for r in value.references() {
            if !r.is_global {
                return Err(BlueprintError::NonGlobalReference.at(path));
            }
            match self.state.get(&r.name).copied() {
                None => {
                    return Err(BlueprintError::UnknownVariable { name: r.name }.at(path));
                }
                Some(State::InProgress) => {
                    return Err(BlueprintError::CyclicDependency {
                        from: name.to_owned(),
                        to: r.name,
                    }
                    .at(path));
                }
                Some(State::Unvisited) => self.visit(&r.name)?,
                Some(State::Done) => {}
            }
        }
        let evaluated = {
            let mut ctx = EvalContext::new(&self.resolved);
            if let Some((dir, staged)) = self.staging.as_mut() {
                ctx = ctx.with_staging(*dir, &mut **staged);
            }
            eval_value(&value, &mut ctx).map_err(|e| e.at(path))?
        };
        tracing::debug!(name, "evaluated global variable");
        let _ = self.resolved.insert(name.to_owned(), evaluated);
        let _ = self.state.insert(name.to_owned(), State::Done);
        Ok(())
    }

    fn run(mut self) -> Result<Dict> {
        let names: Vec<String> = self.vars.keys().map(str::to_owned).collect();
        for name in &names {
            if self.state.get(name) == Some(&State::Unvisited) {
                self.visit(name)?;
            }
        }
        Ok(self.resolved.into_iter().collect())
    }
}

fn evaluator<'a>(vars: &'a Dict, staging: Option<(&'a FsPath, &'a mut StagedFiles)>) -> Evaluator<'a> {
    Evaluator {
        vars,
        state: vars.keys().map(|k| (k.to_owned(), State::Unvisited)).collect(),
        resolved: BTreeMap::new(),
        staging,
    }
}

/// Evaluates every global variable, dependencies first.
///
/// `vars` is not modified; the resolved variables are returned as a new
/// dictionary. Each variable is evaluated against the variables it
/// depends on only.
///
/// # Errors
///
/// Returns the first failure, located at the offending variable: a
/// reference to a module output, to an undefined variable, a cycle, or an
/// evaluation error.
pub fn evaluate_vars(vars: &Dict) -> Result<Dict> {
    evaluator(vars, None).run()
}

/// [`evaluate_vars`], recording `ghpc_stage` calls in `staged`.
///
/// # Errors
///
/// Same as [`evaluate_vars`].
pub fn evaluate_vars_with_staging(
    vars: &Dict,
    blueprint_dir: &FsPath,
    staged: &mut StagedFiles,
) -> Result<Dict> {
    evaluator(vars, Some((blueprint_dir, staged))).run()
}
