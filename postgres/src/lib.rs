//! `populace-postgres`: a [`populace_core::Backend`] implementation over
//! [`tokio_postgres`]. Batches writes into multi-row `INSERT ... RETURNING`
//! statements, streams existing rows back for bloom-filter preloading, and
//! samples random rows for the `Select` field kind.

mod error;
mod params;

pub use error::ConnectError;

use populace_core::backend::{Backend, Row, SelectedRow};
use populace_core::error::{Error, Result};
use populace_core::value::Value;
use std::collections::HashMap;
use tokio_postgres::NoTls;
use tracing::{debug, warn};

use params::SqlValue;

/// A live connection to a PostgreSQL database, driven by a background task
/// the way `tokio_postgres` examples across the ecosystem do it: the
/// `Connection` future is spawned off and polled independently of the
/// `Client` handle we keep.
pub struct PostgresBackend {
    client: tokio_postgres::Client,
    connection_task: tokio::task::JoinHandle<()>,
    /// Primary key column per table, cached after the first real lookup
    /// (or an explicit `set_pk_column` override).
    pk_columns: HashMap<String, String>,
    /// `COUNT(*)` per table, cached for `select_random`'s probabilistic
    /// sampling so repeated calls don't re-scan the table just to learn
    /// its size.
    row_counts: HashMap<String, i64>,
    in_transaction: bool,
}

impl PostgresBackend {
    /// Connects using a `tokio_postgres`-style connection string (e.g.
    /// `host=localhost user=postgres dbname=populace`).
    pub async fn connect(config: &str) -> std::result::Result<Self, ConnectError> {
        let (client, connection) = tokio_postgres::connect(config, NoTls).await?;
        let connection_task = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection driver exited with an error");
            }
        });
        Ok(PostgresBackend {
            client,
            connection_task,
            pk_columns: HashMap::new(),
            row_counts: HashMap::new(),
            in_transaction: false,
        })
    }

    /// Overrides the primary key column name for `table` (default: the
    /// real lookup `get_pk_column` performs against `pg_index`).
    pub fn set_pk_column(&mut self, table: impl Into<String>, column: impl Into<String>) {
        self.pk_columns.insert(table.into(), column.into());
    }

    /// Looks up and caches `table`'s real primary key column name, since
    /// the blueprint's `id` field is a logical name, not necessarily the
    /// SQL column (spec.md §4.8). Falls back to `"id"` when `table` has no
    /// declared primary key.
    async fn pk_for(&mut self, table: &str) -> Result<String> {
        if let Some(pk) = self.pk_columns.get(table) {
            return Ok(pk.clone());
        }
        let row = self
            .client
            .query_opt(
                "SELECT a.attname FROM pg_index i \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 WHERE i.indrelid = $1::regclass AND i.indisprimary \
                 LIMIT 1",
                &[&table],
            )
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        let pk = row
            .map(|r| r.get::<_, String>(0))
            .unwrap_or_else(|| "id".to_string());
        self.pk_columns.insert(table.to_string(), pk.clone());
        Ok(pk)
    }

    /// Looks up and caches `table`'s row count, backing `select_random`'s
    /// `WHERE random() < max/count` sampling (spec.md §4.8/§4.9) instead of
    /// an `ORDER BY random()` full-table sort.
    async fn row_count(&mut self, table: &str) -> Result<i64> {
        if let Some(&n) = self.row_counts.get(table) {
            return Ok(n);
        }
        let row = self
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        let n: i64 = row.get(0);
        self.row_counts.insert(table.to_string(), n);
        Ok(n)
    }
}

fn row_to_values(columns: &[String], row: &tokio_postgres::Row) -> SelectedRow {
    columns
        .iter()
        .enumerate()
        .map(|(idx, _)| params::pg_value_to_value(row, idx))
        .collect()
}

#[async_trait::async_trait]
impl Backend for PostgresBackend {
    async fn transaction(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        self.in_transaction = true;
        Ok(())
    }

    async fn write(&mut self, table: &str, rows: &[Row]) -> Result<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Column set is whatever the first row declares; every row in a
        // batch is expected to share the same field set (the factory
        // produces rows from one item's field list, so this always holds).
        let mut columns: Vec<String> = rows[0].fields.keys().cloned().collect();
        columns.sort();
        let pk = self.pk_for(table).await?;

        let mut param_values: Vec<SqlValue<'_>> = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            for col in &columns {
                param_values.push(SqlValue(row.fields.get(col).unwrap_or(&Value::Null)));
            }
        }

        let mut sql = String::from("INSERT INTO ");
        sql.push_str(table);
        sql.push_str(" (");
        sql.push_str(
            &columns
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", "),
        );
        sql.push_str(") VALUES ");

        let mut placeholder = 1usize;
        let row_clauses: Vec<String> = rows
            .iter()
            .map(|_| {
                let cols: Vec<String> = columns
                    .iter()
                    .map(|_| {
                        let ph = format!("${placeholder}");
                        placeholder += 1;
                        ph
                    })
                    .collect();
                format!("({})", cols.join(", "))
            })
            .collect();
        sql.push_str(&row_clauses.join(", "));
        sql.push_str(&format!(" RETURNING \"{pk}\""));

        debug!(table, rows = rows.len(), "writing batch");

        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = param_values
            .iter()
            .map(|v| v as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();

        let returned = self
            .client
            .query(&sql, &param_refs[..])
            .await
            .map_err(|e| Error::backend(e.to_string()))?;

        if let Some(count) = self.row_counts.get_mut(table) {
            *count += returned.len() as i64;
        }

        Ok(returned
            .iter()
            .map(|row| params::pg_value_to_value(row, 0))
            .collect())
    }

    async fn select(&mut self, table: &str, fields: &[String]) -> Result<Vec<SelectedRow>> {
        let column_list = fields
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {column_list} FROM {table}");
        let rows = self
            .client
            .query(&sql, &[])
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        let fields = fields.to_vec();
        Ok(rows.iter().map(|row| row_to_values(&fields, row)).collect())
    }

    /// Samples up to `max` rows via `WHERE random() < min(max/count, 1)`
    /// against a cached `COUNT(*)`, rather than `ORDER BY random()`'s full
    /// table sort — the whole point of probabilistic sampling is O(1)-ish
    /// lookups against tables that may hold millions of pre-existing rows
    /// (spec.md §4.8/§4.9).
    async fn select_random(
        &mut self,
        table: &str,
        fields: &[String],
        where_clause: &str,
        max: usize,
    ) -> Result<Vec<SelectedRow>> {
        let count = self.row_count(table).await?;

        let column_list = fields
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {column_list} FROM {table}");

        let mut clauses: Vec<String> = Vec::new();
        if count > 0 {
            let probability = (max as f64 / count as f64).min(1.0);
            clauses.push(format!("random() < {probability}"));
        }
        if !where_clause.is_empty() {
            clauses.push(format!("({where_clause})"));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" LIMIT {max}"));

        let rows = self
            .client
            .query(&sql, &[])
            .await
            .map_err(|e| Error::backend(e.to_string()))?;
        let fields = fields.to_vec();
        Ok(rows.iter().map(|row| row_to_values(&fields, row)).collect())
    }

    async fn get_pk_column(&mut self, table: &str) -> Result<String> {
        self.pk_for(table).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client
                .batch_execute("COMMIT")
                .await
                .map_err(|e| Error::backend(e.to_string()))?;
            self.in_transaction = false;
        }
        self.connection_task.abort();
        Ok(())
    }
}
