use rand::Rng;

use super::{GenContext, Generator};
use crate::error::Result;
use crate::value::Value;

/// A coin flip with a configurable probability of `true`.
#[derive(Debug)]
pub struct BooleanGen {
    pub probability_true: f64,
}

impl Default for BooleanGen {
    fn default() -> Self {
        BooleanGen { probability_true: 0.5 }
    }
}

impl Generator for BooleanGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        Ok(Value::Bool(
            ctx.rng.random_bool(self.probability_true.clamp(0.0, 1.0)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn always_true_at_probability_one() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = BooleanGen { probability_true: 1.0 };
        for _ in 0..20 {
            assert_eq!(gen.generate(&mut ctx).unwrap(), Value::Bool(true));
        }
    }
}
