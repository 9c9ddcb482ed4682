//! `Item`: one blueprint entry describing a table to seed — its fields,
//! count policy, storage targets, and inheritance from a parent item.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bloom::BloomFilter;
use crate::count::Count;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::generator::Generator;
use crate::generator::choices::DynamicChoices;
use crate::value::Value;

/// How a single field's value is produced.
#[derive(Clone)]
pub enum FieldKind {
    /// A literal or `$var`/`$(expr)`/`{{ }}` expression.
    Expression(Expr),
    /// A catalog generator, already composed with any `nullable`/`unique`
    /// wrappers the blueprint requested. `Rc` so inherited items can
    /// share one instance (and its `unique` dedup state) with the parent
    /// without cloning the underlying trait object.
    Generator(Rc<dyn Generator>),
    /// `choices` with a list of expressions rather than static literals.
    Choices(DynamicChoices),
    /// Picks a value from an existing row in another table.
    Select {
        table: String,
        column: String,
        where_expr: Option<Expr>,
        max_pool: usize,
    },
    /// Always produces a fresh, empty list that a dependent item's
    /// `store_in` can append into after the fact (the "cyclic storage
    /// pattern", see DESIGN.md).
    Store,
}

/// A composite `unique` key (spec.md §4.3: `unique_with`): the field's own
/// generated value plus one or more sibling fields already resolved
/// earlier in `this`, checked as one tuple against a shared bloom filter.
/// Distinct from the plain `Unique` generator wrapper, which only ever
/// sees its own field's value.
#[derive(Clone)]
pub struct UniqueWith {
    /// Names of sibling fields (in declaration order on this item) whose
    /// resolved `this.<name>` values round out the composite key.
    pub siblings: Vec<String>,
    pub seen: Rc<RefCell<BloomFilter>>,
    pub max_attempts: u32,
}

#[derive(Clone)]
pub struct Field {
    pub kind: FieldKind,
    /// When set, this field's final value is additionally appended into
    /// the named ancestor field's `Store` list, keyed by a `$var` path
    /// that must resolve to a `Value::Store` handle.
    pub store_in: Option<Expr>,
    /// When set, this field's value participates in a composite
    /// uniqueness check alongside its siblings (spec.md §4.3's
    /// `unique_with`) instead of (or as well as) being wrapped in a
    /// plain single-field `Unique` generator.
    pub unique_with: Option<UniqueWith>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Field { kind, store_in: None, unique_with: None }
    }

    pub fn with_store_in(mut self, store_in: Expr) -> Self {
        self.store_in = Some(store_in);
        self
    }

    pub fn with_unique_with(mut self, unique_with: UniqueWith) -> Self {
        self.unique_with = Some(unique_with);
        self
    }

    /// A `shadow` field (spec.md §3/§4.3: `Store` fields are implicitly
    /// shadow) exists only for bookkeeping inside the generation pass —
    /// `this.<field>`, item-level `store_in` targets — and must never be
    /// written to the backend table as a real column.
    pub fn is_shadow(&self) -> bool {
        matches!(self.kind, FieldKind::Store)
    }
}

/// Where an item-level `store_in` binding (spec.md §4.4) writes its
/// evaluated expression.
#[derive(Clone)]
pub enum StoreTarget {
    /// `store_in: { name: expr }` — appends into the blueprint var `name`.
    Global(String),
    /// `store_in: { this.item.field: expr }` — appends into the named
    /// field's `Store` handle on the row that cascaded this item (the
    /// item's `count.by` parent). Arbitrary, non-parent items aren't
    /// addressable this way — see DESIGN.md.
    Item { item: String, field: String },
}

/// One `store_in` entry: evaluated against the freshly written row
/// (after its id is assigned) and pushed onto `target`.
#[derive(Clone)]
pub struct StoreBinding {
    pub target: StoreTarget,
    pub expr: Expr,
}

/// One item's full definition: what table it writes to, how many rows it
/// produces, its fields, and what it inherits from a parent item.
#[derive(Clone)]
pub struct Item {
    pub name: String,
    pub table: String,
    pub count: Count,
    pub fields: HashMap<String, Field>,
    /// Order fields were declared in, preserved so row output and
    /// `this.<field>` memoization follow declaration order exactly like
    /// the blueprint author wrote them.
    pub field_order: Vec<String>,
    /// Item-level `store_in` bindings declared on this item (distinct
    /// from `Field::store_in`, which pushes a single field's own value
    /// rather than routing to an arbitrary global var or ancestor field).
    pub store_in: Vec<StoreBinding>,
    /// Names of items this item stands in for when its own count can
    /// only ever be zero (Open Question 2): dependents whose `count.by`
    /// targets one of these ancestors fan out against this item's rows
    /// instead.
    pub ancestors: Vec<String>,
    pub parent: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, table: impl Into<String>, count: Count) -> Self {
        Item {
            name: name.into(),
            table: table.into(),
            count,
            fields: HashMap::new(),
            field_order: Vec::new(),
            store_in: Vec::new(),
            ancestors: Vec::new(),
            parent: None,
        }
    }

    pub fn add_field(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        if !self.fields.contains_key(&name) {
            self.field_order.push(name.clone());
        }
        self.fields.insert(name, field);
    }

    pub fn add_store_in(&mut self, binding: StoreBinding) {
        self.store_in.push(binding);
    }

    /// Builds a child item that inherits this item's fields, count,
    /// table, and `store_in`, with the child's own declarations
    /// overriding by field name (spec.md §3: copy-with-override, not a
    /// live reference — the child can change its own count and fields
    /// freely after this call without affecting the parent).
    pub fn inherit(&self, child_name: impl Into<String>) -> Item {
        let mut child = Item::new(child_name, self.table.clone(), self.count.clone());
        child.field_order = self.field_order.clone();
        for name in &child.field_order {
            if let Some(field) = self.fields.get(name) {
                child.fields.insert(name.clone(), field.clone());
            }
        }
        child.store_in = self.store_in.clone();
        child.parent = Some(self.name.clone());

        child.ancestors = self.ancestors.clone();
        if self.count.is_always_zero(&HashMap::new()) {
            child.ancestors.push(self.name.clone());
        }

        child
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("item name must not be empty"));
        }
        if self.table.is_empty() {
            return Err(Error::validation_in(&self.name, "table must not be empty"));
        }
        Ok(())
    }
}

/// A handle a parent row hands its children for appending into its
/// `Store` field after the children's own rows are written.
pub fn new_store_handle() -> Rc<RefCell<Vec<Value>>> {
    Rc::new(RefCell::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count::Count;
    use crate::value::Value;

    #[test]
    fn inherit_copies_fields_and_allows_override() {
        let mut parent = Item::new(
            "base_user",
            "users",
            Count::Fixed(Expr::Literal(Value::Int(10))),
        );
        parent.add_field(
            "role",
            Field::new(FieldKind::Expression(Expr::Literal(Value::Str("member".into())))),
        );

        let mut admin = parent.inherit("admin_user");
        assert_eq!(admin.field_order, vec!["role".to_string()]);
        admin.add_field(
            "role",
            Field::new(FieldKind::Expression(Expr::Literal(Value::Str("admin".into())))),
        );
        match &admin.fields["role"].kind {
            FieldKind::Expression(Expr::Literal(Value::Str(s))) => assert_eq!(s, "admin"),
            _ => panic!("unexpected field kind after override"),
        }
        assert_eq!(admin.parent.as_deref(), Some("base_user"));

        match &parent.fields["role"].kind {
            FieldKind::Expression(Expr::Literal(Value::Str(s))) => assert_eq!(s, "member"),
            _ => panic!("parent field should be unaffected by child override"),
        }
    }

    #[test]
    fn validate_rejects_empty_table() {
        let item = Item::new("x", "", Count::Fixed(Expr::Literal(Value::Int(1))));
        assert!(item.validate().is_err());
    }

    #[test]
    fn inherit_appends_ancestor_when_parent_count_is_always_zero() {
        let shadow = Item::new("shadow_user", "users", Count::Fixed(Expr::Literal(Value::Int(0))));
        let child = shadow.inherit("real_user");
        assert_eq!(child.ancestors, vec!["shadow_user".to_string()]);
    }

    #[test]
    fn inherit_does_not_append_ancestor_for_nonzero_count() {
        let parent = Item::new("base_user", "users", Count::Fixed(Expr::Literal(Value::Int(10))));
        let child = parent.inherit("child_user");
        assert!(child.ancestors.is_empty());
    }
}
