//! Fixtures shared by the unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use crate::core::{DestinationStore, LegacySource, SourceRow, SqlValue};
use crate::entity::{EntityRow, EntitySchema};
use crate::error::{MigrateError, Result};
use crate::target::MemoryStore;

/// Create a SQLite file at `path` and run `statements` against it.
pub async fn seed_sqlite(path: &Path, statements: &[&str]) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    for sql in statements {
        sqlx::query(sql).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
}

/// Legacy source backed by in-memory tables.
#[derive(Default)]
pub struct VecSource {
    tables: HashMap<String, (Vec<String>, Vec<SourceRow>)>,
    closes: AtomicUsize,
}

impl VecSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        self.tables.insert(
            name.to_string(),
            (
                columns.iter().map(|c| c.to_string()).collect(),
                rows.into_iter().map(SourceRow::new).collect(),
            ),
        );
        self
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegacySource for VecSource {
    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|(columns, _)| columns.clone())
            .unwrap_or_default())
    }

    async fn select_all(&self, table: &str, _columns: &[String]) -> Result<Vec<SourceRow>> {
        self.tables
            .get(table)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| MigrateError::Config(format!("no such table: {}", table)))
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .tables
            .get(table)
            .map(|(_, rows)| rows.len() as i64)
            .unwrap_or(0))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory store whose Nth bulk insert (1-based) fails.
pub struct FailingStore {
    pub inner: MemoryStore,
    fail_on_batch: usize,
    fail_setup: bool,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn failing_on_batch(n: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on_batch: n,
            fail_setup: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Store whose `ensure_collection` and `count` fail.
    pub fn failing_setup() -> Self {
        Self {
            fail_setup: true,
            ..Self::failing_on_batch(usize::MAX)
        }
    }
}

#[async_trait]
impl DestinationStore for FailingStore {
    async fn delete_all(&self, entity: &EntitySchema) -> Result<u64> {
        self.inner.delete_all(entity).await
    }

    async fn bulk_insert(&self, entity: &EntitySchema, rows: &[EntityRow]) -> Result<u64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_batch {
            return Err(MigrateError::pool("connection reset", "bulk insert"));
        }
        self.inner.bulk_insert(entity, rows).await
    }

    async fn count(&self, entity: &EntitySchema) -> Result<i64> {
        if self.fail_setup {
            return Err(MigrateError::pool("no such table", "counting rows"));
        }
        self.inner.count(entity).await
    }

    async fn ensure_collection(&self, entity: &EntitySchema) -> Result<()> {
        if self.fail_setup {
            return Err(MigrateError::pool("permission denied", "creating table"));
        }
        self.inner.ensure_collection(entity).await
    }

    async fn finalize(&self, _entity: &EntitySchema) -> Result<()> {
        Err(MigrateError::pool("permission denied", "resetting sequence"))
    }

    fn store_type(&self) -> &str {
        "failing"
    }

    async fn close(&self) {}
}
