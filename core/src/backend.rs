//! The backend port: the storage abstraction the blueprint orchestrator
//! writes generated rows through and queries pre-existing rows from. A
//! concrete implementation (`populace-postgres`) wires this to a real
//! database; `fake` (test-only) backs it with in-memory tables.

use std::collections::HashMap;

use crate::error::Result;
use crate::value::Value;

/// One generated row, keyed by column name, plus the id the backend
/// assigned on write (filled in after `Backend::write` returns).
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub fields: HashMap<String, Value>,
}

/// A streamed result row read back from `select`/`select_random`,
/// projected onto the requested field list.
pub type SelectedRow = Vec<Value>;

/// Storage port every blueprint generation run is driven through.
///
/// Implementations are expected to honor the single-logical-thread
/// concurrency model: `generate()` never has more than one of these
/// calls in flight at a time.
#[async_trait::async_trait]
pub trait Backend {
    /// Begins a transaction wrapping the whole run (or a no-op if the
    /// backend has no transactional semantics worth modeling).
    async fn transaction(&mut self) -> Result<()>;

    /// Writes a batch of rows for `table`, returning the backend-assigned
    /// primary key for each row in the same order, so dependents whose
    /// `count.by` targets this item can be driven per parent id.
    async fn write(&mut self, table: &str, rows: &[Row]) -> Result<Vec<Value>>;

    /// Streams existing rows from `table`, projected onto `fields`, for
    /// bloom-filter preloading against pre-existing uniqueness state.
    async fn select(&mut self, table: &str, fields: &[String]) -> Result<Vec<SelectedRow>>;

    /// Returns up to `max` randomly sampled rows from `table` matching
    /// `where_clause` (backend-specific syntax, may be empty), projected
    /// onto `fields`. Backs the `Select` generator.
    async fn select_random(
        &mut self,
        table: &str,
        fields: &[String],
        where_clause: &str,
        max: usize,
    ) -> Result<Vec<SelectedRow>>;

    /// The name of `table`'s primary key column. The blueprint's `id`
    /// field is a logical name, not necessarily the SQL column name, so
    /// implementations are expected to discover and cache this from the
    /// database rather than assume `"id"`.
    async fn get_pk_column(&mut self, table: &str) -> Result<String>;

    /// Commits (or no-ops) the outstanding transaction and releases the
    /// underlying connection.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;

    /// An in-memory `Backend` used by unit and scenario tests so the
    /// engine can run end to end without a live Postgres instance.
    #[derive(Default)]
    pub struct FakeBackend {
        pub tables: HashMap<String, Vec<Row>>,
        pub next_id: i64,
        pub pk_columns: HashMap<String, String>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            FakeBackend {
                tables: HashMap::new(),
                next_id: 1,
                pk_columns: HashMap::new(),
            }
        }

        pub fn seed_existing(&mut self, table: &str, rows: Vec<Row>) {
            self.tables.entry(table.to_string()).or_default().extend(rows);
        }
    }

    #[async_trait::async_trait]
    impl Backend for FakeBackend {
        async fn transaction(&mut self) -> Result<()> {
            Ok(())
        }

        async fn write(&mut self, table: &str, rows: &[Row]) -> Result<Vec<Value>> {
            let pk = self
                .pk_columns
                .get(table)
                .cloned()
                .unwrap_or_else(|| "id".to_string());
            let mut ids = Vec::with_capacity(rows.len());
            let entry = self.tables.entry(table.to_string()).or_default();
            for row in rows {
                let id = self.next_id;
                self.next_id += 1;
                let mut stored = row.clone();
                stored.fields.insert(pk.clone(), Value::Int(id));
                entry.push(stored);
                ids.push(Value::Int(id));
            }
            Ok(ids)
        }

        async fn select(&mut self, table: &str, fields: &[String]) -> Result<Vec<SelectedRow>> {
            let rows = self.tables.get(table).cloned().unwrap_or_default();
            Ok(rows
                .into_iter()
                .map(|row| {
                    fields
                        .iter()
                        .map(|f| row.fields.get(f).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect())
        }

        async fn select_random(
            &mut self,
            table: &str,
            fields: &[String],
            _where_clause: &str,
            max: usize,
        ) -> Result<Vec<SelectedRow>> {
            let all = self.select(table, fields).await?;
            Ok(all.into_iter().take(max).collect())
        }

        async fn get_pk_column(&mut self, table: &str) -> Result<String> {
            Ok(self
                .pk_columns
                .get(table)
                .cloned()
                .unwrap_or_else(|| "id".to_string()))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_assigns_monotonic_ids() {
        let mut backend = FakeBackend::new();
        let rows = vec![Row::default(), Row::default()];
        let ids = backend.write("users", &rows).await.unwrap();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2)]);
    }
}
