//! PostgreSQL destination store.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::{types::ToSql, Config as PgConfig, NoTls};
use tracing::{debug, info};

use super::{create_table_ddl, rows_per_statement};
use crate::config::DestinationConfig;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::{DestinationStore, SqlNullType, SqlValue};
use crate::entity::{EntityRow, EntitySchema, InsertRun, ID_FIELD};
use crate::error::{MigrateError, Result};

/// Bind parameter limit of the PostgreSQL wire protocol.
const MAX_BIND_PARAMS: usize = 65535;

/// Destination backed by a PostgreSQL schema.
pub struct PgStore {
    pool: Pool,
    schema: String,
}

impl PgStore {
    /// Create the connection pool and test one connection.
    pub async fn new(config: &DestinationConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    fn table(&self, entity: &EntitySchema) -> Result<String> {
        qualify_pg(&self.schema, entity.collection())
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }
}

/// Build a multi-row INSERT for one chunk of an insert run.
fn build_insert_sql(
    table: &str,
    columns: &str,
    run: &InsertRun<'_>,
    rows: &[EntityRow],
) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let mut placeholders = Vec::with_capacity(rows.len());
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
        Vec::with_capacity(rows.len() * run.columns.len());

    for row in rows {
        let row_placeholders: Vec<String> = run
            .columns
            .iter()
            .map(|&idx| {
                let value = &row.values()[idx];
                params.push(sql_value_to_param(value));
                format!("${}{}", params.len(), sql_cast_for_value(value))
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns,
        placeholders.join(", ")
    );
    (sql, params)
}

/// Get SQL cast suffix for a value type.
fn sql_cast_for_value(value: &SqlValue) -> &'static str {
    match value.null_type() {
        SqlNullType::I32 => "::integer",
        SqlNullType::I64 => "::bigint",
        SqlNullType::F64 => "::double precision",
        SqlNullType::String | SqlNullType::Untyped => "::text",
        SqlNullType::Bytes => "::bytea",
        SqlNullType::Decimal => "::numeric",
    }
}

/// Convert a value to a parameter whose Rust type matches its cast.
fn sql_value_to_param(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::I32 => Box::new(None::<i32>),
            SqlNullType::I64 => Box::new(None::<i64>),
            SqlNullType::F64 => Box::new(None::<f64>),
            SqlNullType::Bytes => Box::new(None::<Vec<u8>>),
            SqlNullType::Decimal => Box::new(None::<Decimal>),
            SqlNullType::String | SqlNullType::Untyped => Box::new(None::<String>),
        },
        SqlValue::I32(v) => Box::new(*v),
        SqlValue::I64(v) => Box::new(*v),
        SqlValue::F64(v) => Box::new(*v),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(b.clone()),
        SqlValue::Decimal(d) => Box::new(*d),
    }
}

#[async_trait]
impl DestinationStore for PgStore {
    async fn delete_all(&self, entity: &EntitySchema) -> Result<u64> {
        let client = self.client("clearing collection").await?;
        let sql = format!("DELETE FROM {}", self.table(entity)?);
        let deleted = client.execute(&sql, &[]).await?;
        debug!("Deleted {} rows from {}", deleted, entity.collection());
        Ok(deleted)
    }

    async fn bulk_insert(&self, entity: &EntitySchema, rows: &[EntityRow]) -> Result<u64> {
        let table = self.table(entity)?;
        let mut client = self.client("bulk insert").await?;
        let tx = client.transaction().await?;
        let mut inserted = 0u64;

        for run in entity.insert_runs(rows) {
            let columns = run
                .column_names(entity)
                .iter()
                .map(|name| quote_pg(name))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            let chunk_size = rows_per_statement(run.columns.len(), MAX_BIND_PARAMS);

            for chunk in run.rows.chunks(chunk_size) {
                let (sql, params) = build_insert_sql(&table, &columns, &run, chunk);
                let param_refs: Vec<&(dyn ToSql + Sync)> = params
                    .iter()
                    .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                    .collect();
                inserted += tx.execute(sql.as_str(), &param_refs).await?;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn count(&self, entity: &EntitySchema) -> Result<i64> {
        let client = self.client("counting rows").await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.table(entity)?);
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.try_get(0)?)
    }

    async fn ensure_collection(&self, entity: &EntitySchema) -> Result<()> {
        let client = self.client("creating table").await?;
        let ddl = create_table_ddl(
            entity,
            &self.table(entity)?,
            quote_pg,
            "serial PRIMARY KEY",
            "numeric",
        )?;
        client.batch_execute(&ddl).await?;
        debug!("Ensured table {}", self.table(entity)?);
        Ok(())
    }

    /// Move the id sequence past the largest id, so rows inserted with
    /// explicit ids do not collide with later application inserts.
    async fn finalize(&self, entity: &EntitySchema) -> Result<()> {
        let client = self.client("resetting sequence").await?;
        let table = self.table(entity)?;
        let id = quote_pg(ID_FIELD)?;
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence($1, $2), COALESCE(MAX({id}), 1), MAX({id}) IS NOT NULL) FROM {table}",
            id = id,
            table = table
        );
        client.execute(&sql, &[&table, &ID_FIELD]).await?;
        debug!("Reset id sequence for {}", table);
        Ok(())
    }

    fn store_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use crate::entity;

    fn permission(schema: &EntitySchema, id: Option<i64>) -> EntityRow {
        let mut record: Record = vec![
            ("User", SqlValue::from("dana")),
            ("Page", SqlValue::from("reports")),
            ("Access", SqlValue::from("Show")),
        ]
        .into_iter()
        .collect();
        if let Some(id) = id {
            record.insert("id".to_string(), SqlValue::I64(id));
        }
        schema.build(record).unwrap()
    }

    #[test]
    fn test_build_insert_sql_numbers_placeholders_across_rows() {
        let schema = entity::page_permissions("myapp_");
        let rows = vec![permission(&schema, None), permission(&schema, None)];
        let runs = schema.insert_runs(&rows);
        assert_eq!(runs.len(), 1);

        let (sql, params) = build_insert_sql(
            "\"public\".\"myapp_pagepermissions\"",
            "\"User\", \"Page\", \"Access\"",
            &runs[0],
            runs[0].rows,
        );
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"myapp_pagepermissions\" (\"User\", \"Page\", \"Access\") \
             VALUES ($1::text, $2::text, $3::text), ($4::text, $5::text, $6::text)"
        );
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn test_explicit_ids_are_cast_to_bigint() {
        let schema = entity::page_permissions("myapp_");
        let rows = vec![permission(&schema, Some(9))];
        let runs = schema.insert_runs(&rows);
        let (sql, _) = build_insert_sql("t", "c", &runs[0], runs[0].rows);
        assert!(sql.contains("($1::bigint, $2::text"));
    }

    #[test]
    fn test_typed_null_casts() {
        assert_eq!(sql_cast_for_value(&SqlValue::Null(SqlNullType::I32)), "::integer");
        assert_eq!(sql_cast_for_value(&SqlValue::Null(SqlNullType::Decimal)), "::numeric");
        assert_eq!(sql_cast_for_value(&SqlValue::Null(SqlNullType::Untyped)), "::text");
    }
}
