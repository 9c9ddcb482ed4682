use rand::Rng;

use super::{GenContext, Generator};
use crate::error::{Error, Result};
use crate::value::Value;

/// A uniformly distributed integer in `[min, max]`.
#[derive(Debug)]
pub struct IntegerGen {
    pub min: i64,
    pub max: i64,
}

impl Generator for IntegerGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        if self.min > self.max {
            return Err(Error::generation(format!(
                "Integer generator min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        Ok(Value::Int(ctx.rng.random_range(self.min..=self.max)))
    }
}

/// A uniformly distributed float in `[min, max)`, rounded to two decimal
/// places so seeded columns don't carry noise beyond what a human would
/// enter by hand.
#[derive(Debug)]
pub struct FloatGen {
    pub min: f64,
    pub max: f64,
}

impl Generator for FloatGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        if self.min > self.max {
            return Err(Error::generation(format!(
                "Float generator min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        let v: f64 = ctx.rng.random_range(self.min..self.max);
        Ok(Value::Float((v * 100.0).round() / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn integer_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = IntegerGen { min: 10, max: 20 };
        for _ in 0..100 {
            match gen.generate(&mut ctx).unwrap() {
                Value::Int(i) => assert!((10..=20).contains(&i)),
                other => panic!("expected Int, got {other:?}"),
            }
        }
    }

    #[test]
    fn integer_rejects_inverted_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = IntegerGen { min: 20, max: 10 };
        assert!(gen.generate(&mut ctx).is_err());
    }

    #[test]
    fn float_stays_in_bounds_and_rounded() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = FloatGen { min: 1.0, max: 100.0 };
        for _ in 0..100 {
            match gen.generate(&mut ctx).unwrap() {
                Value::Float(v) => {
                    assert!(v >= 1.0 && v < 100.0);
                    let s = format!("{v}");
                    if let Some(dot) = s.find('.') {
                        assert!(s.len() - dot - 1 <= 2);
                    }
                }
                other => panic!("expected Float, got {other:?}"),
            }
        }
    }
}
