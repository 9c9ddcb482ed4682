//! `Blueprint`: the orchestrator. Owns the declared vars and items, walks
//! them in dependency order, and drives the factory/buffer/backend
//! pipeline described in spec.md §3-§5.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::backend::{Backend, Row};
use crate::bloom::BloomFilter;
use crate::buffer::{Buffer, GeneratedRow};
use crate::count::Count;
use crate::error::{Error, Result};
use crate::expr::EvalEnv;
use crate::factory::Factory;
use crate::item::Item;
use crate::value::Value;

/// Default number of rows batched per backend write, matching the
/// teacher's dialect-aware batch sizing in spirit (bounded-memory
/// streaming rather than building the whole table in memory).
const DEFAULT_BATCH_SIZE: usize = 500;

pub struct Blueprint {
    pub vars: HashMap<String, Value>,
    pub items: Vec<Item>,
    pub seed: u64,
    pub batch_size: usize,
    seen: HashMap<(String, String), Rc<RefCell<BloomFilter>>>,
}

impl Blueprint {
    pub fn new(seed: u64) -> Self {
        Blueprint {
            vars: HashMap::new(),
            items: Vec::new(),
            seed,
            batch_size: DEFAULT_BATCH_SIZE,
            seen: HashMap::new(),
        }
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Returns the shared uniqueness-tracking bloom filter for
    /// `table.field`, creating it on first use. Every `Unique` generator
    /// bound to the same table/field should share this handle so
    /// `preload_existing` populates a set every one of them checks
    /// against.
    pub fn bloom_handle(&mut self, table: &str, field: &str) -> Rc<RefCell<BloomFilter>> {
        self.seen
            .entry((table.to_string(), field.to_string()))
            .or_insert_with(|| Rc::new(RefCell::new(BloomFilter::new(4096, 0.01))))
            .clone()
    }

    /// Returns the shared append-list handle backing a global `store_in`
    /// var, creating it (as a `Value::Store`) on first use.
    pub fn store_var(&mut self, name: &str) -> Rc<RefCell<Vec<Value>>> {
        if let Some(Value::Store(handle)) = self.vars.get(name) {
            return handle.clone();
        }
        let handle = crate::item::new_store_handle();
        self.vars.insert(name.to_string(), Value::Store(handle.clone()));
        handle
    }

    /// Attaches a field to an already-declared item, by name, so a later
    /// item's `store_in: { this.<item>.<field>: expr }` can grow a
    /// `Store` list on it (spec.md §4.4). Errors when `item_name` hasn't
    /// been declared yet.
    pub fn add_field_to_item(&mut self, item_name: &str, field_name: &str, field: crate::item::Field) -> Result<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.name == item_name)
            .ok_or_else(|| {
                Error::validation(format!(
                    "store_in references unknown item `{item_name}`"
                ))
            })?;
        item.add_field(field_name, field);
        Ok(())
    }

    /// Validates and appends an item: table/name must be non-empty, and
    /// a `count.by` target must already have been declared (items must be
    /// declared parent-first).
    pub fn add_item(&mut self, item: Item) -> Result<()> {
        item.validate()?;
        if let Some(parent_name) = item.count.by_parent() {
            let known = self.items.iter().any(|existing| {
                existing.name == parent_name || existing.ancestors.iter().any(|a| a == parent_name)
            });
            if !known {
                return Err(Error::validation_in(
                    &item.name,
                    format!("count.by references unknown item `{parent_name}`"),
                ));
            }
        }
        self.items.push(item);
        Ok(())
    }

    /// Preloads existing column values from the backend into every
    /// table/field's shared bloom filter, so `Unique` generators reject
    /// values that already exist in the database (spec.md §8 S5). A
    /// composite `unique_with` key's bloom handle is registered under
    /// `<field>+<sibling1>+...` (see `cli`'s loader), which doubles as the
    /// real column list to select and join in the same order
    /// `Factory::eval_field_unique` does, so a composite key preloads the
    /// actual existing tuples rather than one literal "field" that isn't a
    /// real column.
    pub async fn preload_existing(&mut self, backend: &mut dyn Backend) -> Result<()> {
        let keys: Vec<(String, String)> = self.seen.keys().cloned().collect();
        for (table, key) in keys {
            let fields: Vec<String> = key.split('+').map(str::to_string).collect();
            let rows = backend.select(&table, &fields).await?;
            let handle = self.bloom_handle(&table, &key);
            let mut bloom = handle.borrow_mut();
            for row in rows {
                let composite = row
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\u{1}");
                bloom.insert(composite);
            }
        }
        Ok(())
    }

    /// Runs the full generation pass: every item whose count isn't
    /// parent-driven (`by`) generates independently in declaration
    /// order; each batch write cascades into any dependents whose count
    /// is `by` this item (spec.md §4.6's `batch_written` hook).
    pub async fn generate(&mut self, backend: &mut dyn Backend) -> Result<()> {
        backend.transaction().await?;

        let top_level: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.count.by_parent().is_none())
            .map(|(idx, _)| idx)
            .collect();

        for idx in top_level {
            self.generate_item(idx, None, backend).await?;
        }

        backend.close().await?;
        Ok(())
    }

    async fn generate_item(
        &mut self,
        idx: usize,
        parent_row: Option<&GeneratedRow>,
        backend: &mut dyn Backend,
    ) -> Result<()> {
        let item = self.items[idx].clone();
        info!(item = %item.name, table = %item.table, "generating item");

        // Snapshot vars into a local owned map: Factory borrows it for the
        // whole generation loop, and that loop also needs `&mut self` to
        // flush batches, so it can't hold a borrow of `self.vars` directly.
        let parent_name = item.count.by_parent();
        let mut vars_snapshot = self.vars.clone();
        if let (Some(name), Some(parent)) = (parent_name, parent_row) {
            vars_snapshot.insert(name.to_string(), Value::Row(parent.clone()));
        }

        let empty = HashMap::new();
        let env = EvalEnv {
            vars: &vars_snapshot,
            this: &empty,
        };
        let mut count_rng = StdRng::seed_from_u64(self.seed ^ (idx as u64).wrapping_add(0x9E37_79B9));
        let count = item.count.evaluate(&env, &mut count_rng)?;
        debug!(item = %item.name, count, "resolved row count");

        let factory = match (parent_name, parent_row) {
            (Some(name), Some(parent)) => Factory::with_parent(&item, &vars_snapshot, self.seed, name, parent),
            _ => Factory::new(&item, &vars_snapshot, self.seed),
        };
        let mut buffer = Buffer::new(self.batch_size);

        for i in 0..count {
            let row = factory.build_row(i, backend).await?;
            if let Some(batch) = buffer.push(row) {
                self.flush_batch(idx, batch, parent_row, backend).await?;
            }
        }
        let remaining = buffer.drain();
        if !remaining.is_empty() {
            self.flush_batch(idx, remaining, parent_row, backend).await?;
        }

        Ok(())
    }

    async fn flush_batch(
        &mut self,
        idx: usize,
        mut batch: Vec<GeneratedRow>,
        parent_row: Option<&GeneratedRow>,
        backend: &mut dyn Backend,
    ) -> Result<()> {
        let (table, name, pk, shadow_fields) = {
            let item = &self.items[idx];
            let pk = backend.get_pk_column(&item.table).await?;
            let shadow_fields: Vec<String> = item
                .fields
                .iter()
                .filter(|(_, field)| field.is_shadow())
                .map(|(name, _)| name.clone())
                .collect();
            (item.table.clone(), item.name.clone(), pk, shadow_fields)
        };

        // `db_fields`: the row minus any `shadow` fields (spec.md §3/§4.3 —
        // `Store` fields are bookkeeping only and must never reach the
        // backend as a real column).
        let backend_rows: Vec<Row> = batch
            .iter()
            .map(|fields| {
                let mut db_fields = fields.clone();
                for shadow in &shadow_fields {
                    db_fields.remove(shadow);
                }
                Row { fields: db_fields }
            })
            .collect();
        let ids = backend.write(&table, &backend_rows).await?;
        for (row, id) in batch.iter_mut().zip(ids) {
            row.insert(pk.clone(), id);
        }
        debug!(item = %name, rows = batch.len(), "flushed batch");

        let bindings = self.items[idx].store_in.clone();
        if !bindings.is_empty() {
            let vars_snapshot = self.vars.clone();
            for row in &batch {
                let env = EvalEnv { vars: &vars_snapshot, this: row };
                for binding in &bindings {
                    let value = binding.expr.eval(&env)?;
                    match &binding.target {
                        crate::item::StoreTarget::Global(var_name) => {
                            self.store_var(var_name).borrow_mut().push(value);
                        }
                        crate::item::StoreTarget::Item { field, .. } => {
                            if let Some(Value::Store(handle)) =
                                parent_row.and_then(|p| p.get(field))
                            {
                                handle.borrow_mut().push(value);
                            }
                        }
                    }
                }
            }
        }

        // An item's "identity" for cascade purposes is itself plus any
        // ancestors it stands in for (spec.md §4.4's generate_dependencies:
        // identity set = {name} ∪ ancestors) — a dependent whose `count.by`
        // names an always-zero-count ancestor still cascades off the
        // concrete descendant that actually produced rows.
        let identity: Vec<&str> = std::iter::once(name.as_str())
            .chain(self.items[idx].ancestors.iter().map(String::as_str))
            .collect();
        let dependents: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, dependent)| {
                dependent
                    .count
                    .by_parent()
                    .is_some_and(|by| identity.contains(&by))
            })
            .map(|(i, _)| i)
            .collect();

        for row in &batch {
            for &dep_idx in &dependents {
                Box::pin(self.generate_item(dep_idx, Some(row), backend)).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::count::Count;
    use crate::expr::Expr;
    use crate::generator::numeric::IntegerGen;
    use crate::item::{Field, FieldKind};
    use std::rc::Rc;

    #[tokio::test]
    async fn generates_fixed_count_of_rows() {
        let mut blueprint = Blueprint::new(42);
        let mut item = Item::new("users", "users", Count::Fixed(Expr::Literal(Value::Int(5))));
        item.add_field(
            "age",
            Field::new(FieldKind::Generator(Rc::new(IntegerGen { min: 18, max: 65 }))),
        );
        blueprint.add_item(item).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        assert_eq!(backend.tables["users"].len(), 5);
    }

    #[tokio::test]
    async fn by_count_cascades_per_parent_row() {
        let mut blueprint = Blueprint::new(7);
        let parent = Item::new("orders", "orders", Count::Fixed(Expr::Literal(Value::Int(3))));
        blueprint.add_item(parent).unwrap();

        let child = Item::new("order_items", "order_items", Count::by("orders"));
        blueprint.add_item(child).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        assert_eq!(backend.tables["orders"].len(), 3);
        // Each order row cascades a default one-row generation pass.
        assert_eq!(backend.tables["order_items"].len(), 3);
    }

    #[tokio::test]
    async fn fixed_count_item_with_bounded_generators_s1() {
        use crate::generator::string::TextGen;

        let mut blueprint = Blueprint::new(3);
        let mut item = Item::new("foo", "test", Count::Fixed(Expr::Literal(Value::Int(10))));
        item.add_field(
            "a",
            Field::new(FieldKind::Generator(Rc::new(IntegerGen { min: 1, max: 10 }))),
        );
        item.add_field(
            "b",
            Field::new(FieldKind::Generator(Rc::new(TextGen {
                min_len: 3,
                max_len: 5,
                chars: None,
            }))),
        );
        blueprint.add_item(item).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        let rows = &backend.tables["test"];
        assert_eq!(rows.len(), 10);
        for row in rows {
            match row.fields.get("a") {
                Some(Value::Int(n)) => assert!((1..=10).contains(n)),
                other => panic!("expected Int in [1,10], got {other:?}"),
            }
            match row.fields.get("b") {
                Some(Value::Str(s)) => assert!((3..=5).contains(&s.len())),
                other => panic!("expected Str of length 3..5, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn by_count_fields_can_reference_parent_under_its_own_name_s2() {
        let mut blueprint = Blueprint::new(5);
        let parent = Item::new("foo", "foo", Count::Fixed(Expr::Literal(Value::Int(5))));
        blueprint.add_item(parent).unwrap();

        let mut child = Item::new(
            "bar",
            "bar",
            Count::By { parent: "foo".to_string(), number: Expr::Literal(Value::Int(2)) },
        );
        child.add_field(
            "parent_id",
            Field::new(FieldKind::Expression(Expr::ValueRef("this.foo.id".to_string()))),
        );
        blueprint.add_item(child).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        let foo_ids: Vec<Value> = backend.tables["foo"]
            .iter()
            .map(|r| r.fields["id"].clone())
            .collect();
        let mut bar_parent_ids: Vec<Value> = backend.tables["bar"]
            .iter()
            .map(|r| r.fields["parent_id"].clone())
            .collect();

        // Every foo.id should appear exactly twice among bar.parent_id.
        for id in &foo_ids {
            let count = bar_parent_ids.iter().filter(|v| *v == id).count();
            assert_eq!(count, 2, "expected foo id {id:?} to appear twice in bar.parent_id");
        }
        bar_parent_ids.retain(|v| !foo_ids.contains(v));
        assert!(bar_parent_ids.is_empty(), "unexpected parent_id values not among foo.id");
    }

    #[tokio::test]
    async fn inheritance_chain_of_always_zero_counts_cascades_through_ancestors_s4() {
        let mut blueprint = Blueprint::new(17);
        let foo = Item::new("foo", "foo", Count::Fixed(Expr::Literal(Value::Int(0))));
        let foo2 = foo.inherit("foo2");
        let mut foo3 = foo2.inherit("foo3");
        foo3.count = Count::Fixed(Expr::Literal(Value::Int(2)));

        blueprint.add_item(foo).unwrap();
        blueprint.add_item(foo2).unwrap();
        blueprint.add_item(foo3).unwrap();

        let bar = Item::new(
            "bar",
            "bar",
            Count::By { parent: "foo".to_string(), number: Expr::Literal(Value::Int(2)) },
        );
        blueprint.add_item(bar).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        assert_eq!(backend.tables["foo3"].len(), 2);
        assert_eq!(backend.tables["bar"].len(), 4);
    }

    #[tokio::test]
    async fn by_count_honors_explicit_number_per_parent() {
        let mut blueprint = Blueprint::new(9);
        let parent = Item::new("foo", "foo", Count::Fixed(Expr::Literal(Value::Int(5))));
        blueprint.add_item(parent).unwrap();

        let child = Item::new(
            "bar",
            "bar",
            Count::By {
                parent: "foo".to_string(),
                number: Expr::Literal(Value::Int(2)),
            },
        );
        blueprint.add_item(child).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        assert_eq!(backend.tables["foo"].len(), 5);
        assert_eq!(backend.tables["bar"].len(), 10);
    }

    #[tokio::test]
    async fn rejects_item_whose_by_target_is_unknown() {
        let mut blueprint = Blueprint::new(1);
        let orphan = Item::new("children", "children", Count::by("missing_parent"));
        assert!(blueprint.add_item(orphan).is_err());
    }

    #[tokio::test]
    async fn global_store_in_collects_every_row() {
        use crate::item::{StoreBinding, StoreTarget};

        let mut blueprint = Blueprint::new(11);
        let mut foo = Item::new("foo", "foo", Count::Fixed(Expr::Literal(Value::Int(10))));
        foo.add_store_in(StoreBinding {
            target: StoreTarget::Global("foos".to_string()),
            expr: Expr::ValueRef("this.id".to_string()),
        });
        blueprint.add_item(foo).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        match blueprint.vars.get("foos") {
            Some(Value::Store(handle)) => assert_eq!(handle.borrow().len(), 10),
            other => panic!("expected a Store var, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn item_store_in_appends_to_cascading_parent_s3() {
        use crate::item::{Field, FieldKind, StoreBinding, StoreTarget};

        let mut blueprint = Blueprint::new(13);
        let mut foo = Item::new("foo", "foo", Count::Fixed(Expr::Literal(Value::Int(10))));
        foo.add_field("bar_ids", Field::new(FieldKind::Store));
        foo.add_store_in(StoreBinding {
            target: StoreTarget::Global("foos".to_string()),
            expr: Expr::ValueRef("this".to_string()),
        });
        blueprint.add_item(foo).unwrap();

        let mut bar = Item::new(
            "bar",
            "bar",
            Count::By { parent: "foo".to_string(), number: Expr::Literal(Value::Int(2)) },
        );
        bar.add_store_in(StoreBinding {
            target: StoreTarget::Item { item: "foo".to_string(), field: "bar_ids".to_string() },
            expr: Expr::ValueRef("this.id".to_string()),
        });
        blueprint.add_item(bar).unwrap();

        let mut backend = FakeBackend::new();
        blueprint.generate(&mut backend).await.unwrap();

        assert_eq!(backend.tables["bar"].len(), 20);

        let foos = match blueprint.vars.get("foos") {
            Some(Value::Store(handle)) => handle.borrow().clone(),
            other => panic!("expected a Store var, got {other:?}"),
        };
        assert_eq!(foos.len(), 10);

        for foo_row in &foos {
            let Value::Row(fields) = foo_row else {
                panic!("expected a row, got {foo_row:?}");
            };
            let Value::Store(bar_ids) = &fields["bar_ids"] else {
                panic!("expected bar_ids to be a store field");
            };
            let bar_ids = bar_ids.borrow();
            assert_eq!(bar_ids.len(), 2, "expected exactly two children per foo row");
        }

        // Every id a foo row's bar_ids recorded must be one of bar's actual
        // generated ids, and every bar id must appear in exactly one foo's list.
        let bar_ids: Vec<Value> = backend.tables["bar"].iter().map(|r| r.fields["id"].clone()).collect();
        let mut recorded: Vec<Value> = Vec::new();
        for foo_row in &foos {
            let Value::Row(fields) = foo_row else { unreachable!() };
            let Value::Store(handle) = &fields["bar_ids"] else { unreachable!() };
            recorded.extend(handle.borrow().iter().cloned());
        }
        recorded.sort_by_key(|v| v.to_string());
        let mut expected = bar_ids.clone();
        expected.sort_by_key(|v| v.to_string());
        assert_eq!(recorded, expected);
    }

    #[tokio::test]
    async fn preload_existing_makes_unique_reject_known_values_s5() {
        let mut backend = FakeBackend::new();
        let mut homer = HashMap::new();
        homer.insert("id".to_string(), Value::Int(1));
        homer.insert("firstname".to_string(), Value::Str("Homer".into()));
        backend.seed_existing("people", vec![Row { fields: homer }]);

        let mut blueprint = Blueprint::new(21);

        // `id` always generates 1 (IntegerGen with min==max), wrapped in
        // Unique against the blueprint's shared bloom handle for
        // people.id — the same handle `preload_existing` populates below.
        let handle = blueprint.bloom_handle("people", "id");
        let mut item = Item::new("people", "people", Count::Fixed(Expr::Literal(Value::Int(1))));
        item.add_field(
            "id",
            Field::new(FieldKind::Generator(Rc::new(crate::generator::Unique::with_shared(
                Box::new(IntegerGen { min: 1, max: 1 }),
                handle,
            )))),
        );
        blueprint.add_item(item).unwrap();

        blueprint.preload_existing(&mut backend).await.unwrap();
        let result = blueprint.generate(&mut backend).await;
        assert!(result.is_err(), "expected id=1 to be rejected as already present");
    }

    #[tokio::test]
    async fn preload_existing_makes_composite_unique_reject_known_tuple_s5() {
        let mut backend = FakeBackend::new();
        let mut homer = HashMap::new();
        homer.insert("id".to_string(), Value::Int(1));
        homer.insert("firstname".to_string(), Value::Str("Homer".into()));
        homer.insert("lastname".to_string(), Value::Str("Simpson".into()));
        homer.insert("birth".to_string(), Value::Str("1956-06-18".into()));
        let mut marge = HashMap::new();
        marge.insert("id".to_string(), Value::Int(2));
        marge.insert("firstname".to_string(), Value::Str("Marge".into()));
        marge.insert("lastname".to_string(), Value::Str("Simpson".into()));
        marge.insert("birth".to_string(), Value::Str("1956-03-19".into()));
        backend.seed_existing(
            "people",
            vec![Row { fields: homer }, Row { fields: marge }],
        );

        let mut blueprint = Blueprint::new(23);
        let composite_handle = blueprint.bloom_handle("people", "firstname+lastname+birth");

        let mut item = Item::new("people", "people", Count::Fixed(Expr::Literal(Value::Int(1))));
        item.add_field(
            "lastname",
            Field::new(FieldKind::Expression(Expr::Literal(Value::Str("Simpson".into())))),
        );
        item.add_field(
            "birth",
            Field::new(FieldKind::Expression(Expr::Literal(Value::Str("1956-06-18".into())))),
        );
        item.add_field(
            "firstname",
            Field::new(FieldKind::Expression(Expr::Literal(Value::Str("Homer".into()))))
                .with_unique_with(crate::item::UniqueWith {
                    siblings: vec!["lastname".to_string(), "birth".to_string()],
                    seen: composite_handle,
                    max_attempts: 10,
                }),
        );
        blueprint.add_item(item).unwrap();

        blueprint.preload_existing(&mut backend).await.unwrap();
        let result = blueprint.generate(&mut backend).await;
        assert!(
            result.is_err(),
            "expected (Homer, Simpson, 1956-06-18) to be rejected as already present"
        );
    }
}
