use rand::Rng;
use uuid::Builder;

use super::{GenContext, Generator};
use crate::error::Result;
use crate::value::Value;

/// A random (v4) UUID, seeded from the row's deterministic RNG rather
/// than `uuid`'s own OS-backed generator so a blueprint seed still
/// reproduces these columns byte for byte.
#[derive(Debug, Default)]
pub struct UuidGen;

impl Generator for UuidGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let mut bytes = [0u8; 16];
        ctx.rng.fill(&mut bytes);
        let uuid = Builder::from_random_bytes(bytes).into_uuid();
        Ok(Value::Str(uuid.to_string()))
    }
}
