//! `Factory`: builds one row for an item, evaluating each field in
//! declaration order and memoizing results so later fields can reference
//! earlier ones through `this.<field>`.

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::expr::EvalEnv;
use crate::generator::GenContext;
use crate::item::{Field, FieldKind, Item, new_store_handle};
use crate::rng::column_seed;
use crate::value::Value;

pub struct Factory<'a> {
    item: &'a Item,
    vars: &'a HashMap<String, Value>,
    blueprint_seed: u64,
    /// The cascading parent's row, pre-seeded into `this` under the
    /// parent item's own name (spec.md §4.4/§4.5: "the parent, if any, is
    /// pre-seeded under the parent's `by`-name"), so a field can reference
    /// `this.<parent_name>.<field>`.
    parent_binding: Option<(&'a str, &'a HashMap<String, Value>)>,
}

impl<'a> Factory<'a> {
    pub fn new(item: &'a Item, vars: &'a HashMap<String, Value>, blueprint_seed: u64) -> Self {
        Factory { item, vars, blueprint_seed, parent_binding: None }
    }

    pub fn with_parent(
        item: &'a Item,
        vars: &'a HashMap<String, Value>,
        blueprint_seed: u64,
        parent_name: &'a str,
        parent_row: &'a HashMap<String, Value>,
    ) -> Self {
        Factory {
            item,
            vars,
            blueprint_seed,
            parent_binding: Some((parent_name, parent_row)),
        }
    }

    /// Evaluates every field of `item` for row `index`, in declaration
    /// order, exposing already-resolved fields to later ones as
    /// `this.<field>`.
    pub async fn build_row(
        &self,
        index: usize,
        backend: &mut dyn Backend,
    ) -> Result<HashMap<String, Value>> {
        let mut this: HashMap<String, Value> = HashMap::new();
        if let Some((parent_name, parent_row)) = self.parent_binding {
            this.insert(parent_name.to_string(), Value::Row(parent_row.clone()));
        }

        for field_name in &self.item.field_order {
            let field = self
                .item
                .fields
                .get(field_name)
                .expect("field_order must stay in sync with fields");
            let value = self
                .eval_field_unique(field_name, field, index, &this, backend)
                .await
                .map_err(|e| annotate(e, &self.item.name, field_name))?;

            if let Some(store_in) = &field.store_in {
                self.push_into_store(store_in, &this, &value)?;
            }

            this.insert(field_name.clone(), value);
        }

        Ok(this)
    }

    /// Evaluates `field`, and, when it carries a composite `unique_with`
    /// (spec.md §4.3's `unique_with`: a field-name or list of sibling
    /// field names rather than a bare `true`), re-draws the raw value
    /// against the same shared bloom filter the siblings' tuple is
    /// checked with, up to `max_attempts` times, before raising a
    /// generation error.
    async fn eval_field_unique(
        &self,
        field_name: &str,
        field: &Field,
        index: usize,
        this: &HashMap<String, Value>,
        backend: &mut dyn Backend,
    ) -> Result<Value> {
        let Some(unique_with) = &field.unique_with else {
            return self.eval_field(field_name, field, index, 0, this, backend).await;
        };

        let mut siblings = Vec::with_capacity(unique_with.siblings.len());
        for sibling in &unique_with.siblings {
            let value = this.get(sibling).ok_or_else(|| {
                Error::generation(format!(
                    "unique_with sibling `{sibling}` has not been resolved yet (declare it before `{field_name}`)"
                ))
            })?;
            siblings.push(value.to_string());
        }

        for attempt in 0..unique_with.max_attempts {
            let value = self.eval_field(field_name, field, index, attempt, this, backend).await?;
            let key = std::iter::once(value.to_string())
                .chain(siblings.iter().cloned())
                .collect::<Vec<_>>()
                .join("\u{1}");
            if !unique_with.seen.borrow_mut().check_and_insert(key) {
                return Ok(value);
            }
        }
        Err(Error::generation(format!(
            "could not find a unique `{field_name}` + {:?} combination after {} attempts",
            unique_with.siblings, unique_with.max_attempts
        )))
    }

    async fn eval_field(
        &self,
        field_name: &str,
        field: &Field,
        index: usize,
        attempt: u32,
        this: &HashMap<String, Value>,
        backend: &mut dyn Backend,
    ) -> Result<Value> {
        let env = EvalEnv { vars: self.vars, this };

        match &field.kind {
            FieldKind::Expression(expr) => expr.eval(&env),
            FieldKind::Generator(generator) => {
                let seed = column_seed(&self.item.table, field_name, self.blueprint_seed);
                let mut rng = StdRng::seed_from_u64(retry_seed(seed, index, attempt));
                let mut ctx = GenContext { rng: &mut rng, index };
                generator.generate(&mut ctx)
            }
            FieldKind::Choices(choices) => {
                let seed = column_seed(&self.item.table, field_name, self.blueprint_seed);
                let mut rng = StdRng::seed_from_u64(retry_seed(seed, index, attempt));
                let mut ctx = GenContext { rng: &mut rng, index };
                choices.generate(&mut ctx, &env)
            }
            FieldKind::Select { table, column, where_expr, max_pool } => {
                let where_clause = where_expr
                    .as_ref()
                    .map(|e| e.eval(&env))
                    .transpose()?
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let rows = backend
                    .select_random(table, std::slice::from_ref(column), &where_clause, *max_pool)
                    .await?;
                if rows.is_empty() {
                    return Err(Error::generation(format!(
                        "Select generator found no rows in `{table}` matching the given condition"
                    )));
                }
                let seed = column_seed(&self.item.table, field_name, self.blueprint_seed);
                let mut rng = StdRng::seed_from_u64(retry_seed(seed, index, attempt));
                let pick = rng.random_range(0..rows.len());
                Ok(rows[pick].first().cloned().unwrap_or(Value::Null))
            }
            FieldKind::Store => Ok(Value::Store(new_store_handle())),
        }
    }

    /// Resolves `store_in`'s target path against `vars`/`this` and
    /// appends `value` onto the `Store` handle it points to.
    fn push_into_store(
        &self,
        store_in: &crate::expr::Expr,
        this: &HashMap<String, Value>,
        value: &Value,
    ) -> Result<()> {
        let env = EvalEnv { vars: self.vars, this };
        let target = store_in.eval(&env)?;
        match target {
            Value::Store(handle) => {
                handle.borrow_mut().push(value.clone());
                Ok(())
            }
            other => Err(Error::generation(format!(
                "store_in target did not resolve to a store field: {other:?}"
            ))),
        }
    }
}

/// Mixes a retry `attempt` into the per-row seed so a `unique`/`unique_with`
/// re-draw doesn't just reproduce the same rejected value (row `index`
/// alone is deterministic across attempts).
fn retry_seed(seed: u64, index: usize, attempt: u32) -> u64 {
    seed.wrapping_add(index as u64)
        .wrapping_add((attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn annotate(err: Error, item: &str, field: &str) -> Error {
    match err {
        Error::Generation { message, .. } => Error::Generation {
            message: format!("field `{field}`: {message}"),
            item: Some(item.to_string()),
        },
        other => other,
    }
}
