//! SQLite destination store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use super::{create_table_ddl, rows_per_statement};
use crate::core::identifier::quote_sqlite;
use crate::core::{DestinationStore, SqlValue};
use crate::entity::{EntityRow, EntitySchema};
use crate::error::{MigrateError, Result};

/// SQLite's default SQLITE_MAX_VARIABLE_NUMBER since 3.32.
const MAX_BIND_PARAMS: usize = 32766;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Destination backed by a SQLite file.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `path`.
    pub async fn open(path: &Path, max_conns: usize, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_conns as u32)
            .connect_with(options)
            .await
            .map_err(|e| {
                MigrateError::pool(e, format!("opening SQLite destination {}", path.display()))
            })?;

        info!("Connected to SQLite destination: {}", path.display());

        Ok(Self { pool })
    }
}

fn push_value(builder: &mut Separated<'_, '_, Sqlite, &'static str>, value: &SqlValue) {
    match value {
        SqlValue::Null(_) => builder.push_bind(None::<String>),
        SqlValue::I32(v) => builder.push_bind(*v),
        SqlValue::I64(v) => builder.push_bind(*v),
        SqlValue::F64(v) => builder.push_bind(*v),
        SqlValue::Text(s) => builder.push_bind(s.clone()),
        SqlValue::Bytes(b) => builder.push_bind(b.clone()),
        // NUMERIC affinity stores the text as an exact number.
        SqlValue::Decimal(d) => builder.push_bind(d.to_string()),
    };
}

#[async_trait]
impl DestinationStore for SqliteStore {
    async fn delete_all(&self, entity: &EntitySchema) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quote_sqlite(entity.collection())?);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        debug!("Deleted {} rows from {}", result.rows_affected(), entity.collection());
        Ok(result.rows_affected())
    }

    async fn bulk_insert(&self, entity: &EntitySchema, rows: &[EntityRow]) -> Result<u64> {
        let table = quote_sqlite(entity.collection())?;
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for run in entity.insert_runs(rows) {
            let names = run.column_names(entity);
            let columns = names
                .iter()
                .map(|name| quote_sqlite(name))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            let chunk_size = rows_per_statement(run.columns.len(), MAX_BIND_PARAMS);

            for chunk in run.rows.chunks(chunk_size) {
                let mut builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, columns));
                builder.push_values(chunk, |mut b, row| {
                    for &idx in &run.columns {
                        push_value(&mut b, &row.values()[idx]);
                    }
                });
                let result = builder.build().execute(&mut *tx).await?;
                inserted += result.rows_affected();
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn count(&self, entity: &EntitySchema) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite(entity.collection())?);
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn ensure_collection(&self, entity: &EntitySchema) -> Result<()> {
        let ddl = create_table_ddl(
            entity,
            &quote_sqlite(entity.collection())?,
            quote_sqlite,
            "integer NOT NULL PRIMARY KEY AUTOINCREMENT",
            "decimal",
        )?;
        sqlx::query(&ddl).execute(&self.pool).await?;
        debug!("Ensured table {}", entity.collection());
        Ok(())
    }

    fn store_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
