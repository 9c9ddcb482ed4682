use rand::Rng;

use super::{GenContext, Generator};
use crate::error::{Error, Result};
use crate::expr::{EvalEnv, Expr};
use crate::value::Value;

/// Picks uniformly from a fixed list of literal values, known up front
/// (the "static" mode of populous' `Choices` generator).
#[derive(Debug)]
pub struct StaticChoices {
    pub choices: Vec<Value>,
}

impl Generator for StaticChoices {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        if self.choices.is_empty() {
            return Err(Error::generation("Choices generator has no values to choose from"));
        }
        let idx = ctx.rng.random_range(0..self.choices.len());
        Ok(self.choices[idx].clone())
    }
}

/// Where a `DynamicChoices` generator gets its candidate list from.
#[derive(Debug, Clone)]
pub enum ChoicesSource {
    /// A literal list of expressions, each evaluated to pick one; an
    /// entry may itself be a `$var` reference.
    Literal(Vec<Expr>),
    /// A single `$var` reference that resolves to the whole candidate
    /// list, re-read every call — so the set of choices can change
    /// between generation passes (spec scenario: `Choices($test)` with
    /// `vars.test` mutated between runs).
    ListRef(Expr),
}

/// Picks uniformly from a list re-evaluated per row (the "dynamic" mode
/// of the `Choices` generator).
#[derive(Debug, Clone)]
pub struct DynamicChoices {
    pub source: ChoicesSource,
    /// When the resolved list is empty: `true` yields `Value::Null`,
    /// `false` raises a generation error. Distinct from the generic
    /// `Nullable` wrapper's per-call probability — this only fires when
    /// there's nothing to choose from at all.
    pub nullable: bool,
}

impl DynamicChoices {
    pub fn generate(&self, ctx: &mut GenContext<'_>, env: &EvalEnv<'_>) -> Result<Value> {
        match &self.source {
            ChoicesSource::Literal(exprs) => {
                if exprs.is_empty() {
                    return self.empty();
                }
                let idx = ctx.rng.random_range(0..exprs.len());
                exprs[idx].eval(env)
            }
            ChoicesSource::ListRef(list_expr) => {
                let list = match list_expr.eval(env)? {
                    Value::List(items) => items,
                    other => vec![other],
                };
                if list.is_empty() {
                    return self.empty();
                }
                let idx = ctx.rng.random_range(0..list.len());
                Ok(list[idx].clone())
            }
        }
    }

    fn empty(&self) -> Result<Value> {
        if self.nullable {
            Ok(Value::Null)
        } else {
            Err(Error::generation("Choices generator has no values to choose from"))
        }
    }
}
