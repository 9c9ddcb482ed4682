//! The generator catalog: composable value generators for seeding
//! database columns, plus the `nullable`/`unique` cross-cutting wrappers
//! every entry in the catalog can be composed with.

pub mod boolean;
pub mod choices;
pub mod numeric;
pub mod special;
pub mod string;
pub mod temporal;

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;
use rand::rngs::StdRng;

use crate::bloom::BloomFilter;
use crate::error::{Error, Result};
use crate::value::Value;

/// Per-call context a generator runs under: its deterministic RNG and the
/// 0-based index of the row currently being generated (some generators,
/// like `Email`, fold the index into the value to keep output unique
/// without needing the `unique` wrapper).
pub struct GenContext<'a> {
    pub rng: &'a mut StdRng,
    pub index: usize,
}

/// A value generator. Implementations are deterministic given the same
/// RNG state; randomness always flows through `ctx.rng`, never a thread
/// or process global, so a blueprint seed reproduces byte-for-byte.
pub trait Generator: std::fmt::Debug {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value>;
}

/// Wraps a generator so it produces `Value::Null` with the given
/// probability instead of delegating, composed explicitly rather than
/// through inheritance (DESIGN NOTES §9).
#[derive(Debug)]
pub struct Nullable {
    pub inner: Box<dyn Generator>,
    pub probability: f64,
}

impl Generator for Nullable {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        if ctx.rng.random_bool(self.probability.clamp(0.0, 1.0)) {
            Ok(Value::Null)
        } else {
            self.inner.generate(ctx)
        }
    }
}

/// Wraps a generator so it re-draws until the produced value has not been
/// seen before, tracked through a bloom filter. Raises a generation error
/// after too many failed attempts, since an exhausted value space would
/// otherwise spin forever. The bloom filter lives behind a shared
/// `Rc<RefCell<_>>` — when a blueprint preloads pre-existing column
/// values (spec.md §8 scenario S5), it hands every `Unique` generator
/// for that table/field the same handle, so freshly generated rows are
/// checked against both the values generated this run and whatever
/// already exists in the database.
pub struct Unique {
    pub inner: Box<dyn Generator>,
    seen: Rc<RefCell<BloomFilter>>,
    pub max_attempts: u32,
}

impl std::fmt::Debug for Unique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unique").field("inner", &self.inner).finish()
    }
}

impl Unique {
    pub fn new(inner: Box<dyn Generator>) -> Self {
        Unique {
            inner,
            seen: Rc::new(RefCell::new(BloomFilter::new(1024, 0.01))),
            max_attempts: 10_000,
        }
    }

    pub fn with_shared(inner: Box<dyn Generator>, seen: Rc<RefCell<BloomFilter>>) -> Self {
        Unique { inner, seen, max_attempts: 10_000 }
    }
}

impl Generator for Unique {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        for _ in 0..self.max_attempts {
            let candidate = self.inner.generate(ctx)?;
            let key = candidate.to_string();
            if !self.seen.borrow_mut().check_and_insert(key) {
                return Ok(candidate);
            }
        }
        Err(Error::generation(format!(
            "could not find a unique value after {} attempts",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[derive(Debug)]
    struct Constant(Value);
    impl Generator for Constant {
        fn generate(&self, _ctx: &mut GenContext<'_>) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct Counter(std::cell::Cell<i64>);
    impl Generator for Counter {
        fn generate(&self, _ctx: &mut GenContext<'_>) -> Result<Value> {
            let n = self.0.get();
            self.0.set(n + 1);
            Ok(Value::Int(n))
        }
    }

    #[test]
    fn nullable_always_null_at_probability_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = Nullable {
            inner: Box::new(Constant(Value::Int(5))),
            probability: 1.0,
        };
        assert_eq!(gen.generate(&mut ctx).unwrap(), Value::Null);
    }

    #[test]
    fn unique_rejects_repeats() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let gen = Unique::new(Box::new(Counter(std::cell::Cell::new(0))));
        let a = gen.generate(&mut ctx).unwrap();
        let b = gen.generate(&mut ctx).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unique_errors_when_space_exhausted() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = GenContext { rng: &mut rng, index: 0 };
        let mut gen = Unique::new(Box::new(Constant(Value::Int(1))));
        gen.max_attempts = 5;
        assert!(gen.generate(&mut ctx).is_ok());
        assert!(gen.generate(&mut ctx).is_err());
    }
}
