//! Item count policies: a fixed number, a random range, or a per-parent-row
//! count driven by `by` (one count per distinct value of a parent field).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expr::{EvalEnv, Expr};
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Count {
    /// `count: 10` or `count: { number: $some_expr }`.
    Fixed(Expr),
    /// `count: { min: 1, max: 5 }`.
    Ranged { min: Expr, max: Expr },
    /// `count: { number: 2, by: foo }` — this item doesn't generate
    /// independently; instead a generation pass fires once per row the
    /// named parent item writes, and `number` (default 1) is how many
    /// rows each pass produces.
    By { parent: String, number: Expr },
}

impl Count {
    /// `count: { by: parent }` with the implicit default of one row per
    /// parent row (`number` omitted).
    pub fn by(parent: impl Into<String>) -> Count {
        Count::By {
            parent: parent.into(),
            number: Expr::Literal(Value::Int(1)),
        }
    }

    /// Resolves the row count against the current eval scope. For `By`,
    /// this resolves `number` — the per-cascade-pass count — since the
    /// decision of *when* to cascade (once per parent row) lives in the
    /// blueprint orchestrator, not here.
    pub fn evaluate(&self, env: &EvalEnv<'_>, rng: &mut impl rand::Rng) -> Result<usize> {
        match self {
            Count::Fixed(expr) => eval_non_negative(expr, env),
            Count::Ranged { min, max } => {
                let lo = eval_non_negative(min, env)?;
                let hi = eval_non_negative(max, env)?;
                if lo > hi {
                    return Err(Error::generation(format!(
                        "count range min ({lo}) is greater than max ({hi})"
                    )));
                }
                Ok(rng.random_range(lo..=hi))
            }
            Count::By { number, .. } => eval_non_negative(number, env),
        }
    }

    /// The parent item name this count cascades from, if any.
    pub fn by_parent(&self) -> Option<&str> {
        match self {
            Count::By { parent, .. } => Some(parent.as_str()),
            _ => None,
        }
    }

    /// True when this count can only ever produce zero rows on its own —
    /// either a fixed zero or a range whose bounds are both zero. Per
    /// Open Question 2, both forms make the item an ancestor-append
    /// candidate for any item whose `by` targets it.
    pub fn is_always_zero(&self, vars: &HashMap<String, Value>) -> bool {
        let empty_this = HashMap::new();
        let env = EvalEnv {
            vars,
            this: &empty_this,
        };
        match self {
            Count::Fixed(expr) => matches!(expr.eval(&env), Ok(Value::Int(0))),
            Count::Ranged { min, max } => {
                let lo = expr_as_int(min, &env);
                let hi = expr_as_int(max, &env);
                matches!((lo, hi), (Some(0), Some(0)))
            }
            Count::By { .. } => false,
        }
    }
}

fn expr_as_int(expr: &Expr, env: &EvalEnv<'_>) -> Option<i64> {
    expr.eval(env).ok().and_then(|v| v.as_int())
}

fn eval_non_negative(expr: &Expr, env: &EvalEnv<'_>) -> Result<usize> {
    let value = expr.eval(env)?;
    match value.as_int() {
        Some(i) if i >= 0 => Ok(i as usize),
        Some(i) => Err(Error::generation(format!(
            "count must be a non-negative integer, got {i}"
        ))),
        None => Err(Error::generation(format!(
            "count expression did not resolve to an integer: {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_count_resolves_literal() {
        let vars = HashMap::new();
        let this = HashMap::new();
        let env = EvalEnv { vars: &vars, this: &this };
        let mut rng = StdRng::seed_from_u64(1);
        let count = Count::Fixed(Expr::Literal(Value::Int(10)));
        assert_eq!(count.evaluate(&env, &mut rng).unwrap(), 10);
    }

    #[test]
    fn ranged_count_stays_in_bounds() {
        let vars = HashMap::new();
        let this = HashMap::new();
        let env = EvalEnv { vars: &vars, this: &this };
        let mut rng = StdRng::seed_from_u64(1);
        let count = Count::Ranged {
            min: Expr::Literal(Value::Int(2)),
            max: Expr::Literal(Value::Int(4)),
        };
        for _ in 0..50 {
            let n = count.evaluate(&env, &mut rng).unwrap();
            assert!((2..=4).contains(&n));
        }
    }

    #[test]
    fn zero_fixed_and_zero_range_are_both_always_zero() {
        let vars = HashMap::new();
        let fixed = Count::Fixed(Expr::Literal(Value::Int(0)));
        let ranged = Count::Ranged {
            min: Expr::Literal(Value::Int(0)),
            max: Expr::Literal(Value::Int(0)),
        };
        assert!(fixed.is_always_zero(&vars));
        assert!(ranged.is_always_zero(&vars));
    }

    #[test]
    fn by_count_resolves_its_per_parent_number() {
        let vars = HashMap::new();
        let this = HashMap::new();
        let env = EvalEnv { vars: &vars, this: &this };
        let mut rng = StdRng::seed_from_u64(1);
        let count = Count::By {
            parent: "orders".to_string(),
            number: Expr::Literal(Value::Int(3)),
        };
        assert_eq!(count.evaluate(&env, &mut rng).unwrap(), 3);
        assert_eq!(count.by_parent(), Some("orders"));
    }

    #[test]
    fn by_helper_defaults_to_one_row_per_parent() {
        let vars = HashMap::new();
        let this = HashMap::new();
        let env = EvalEnv { vars: &vars, this: &this };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Count::by("orders").evaluate(&env, &mut rng).unwrap(), 1);
    }
}
