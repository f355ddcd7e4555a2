//! SQLite legacy source reader.
//!
//! Implements the `LegacySource` trait over SQLx. Column lists come from
//! `pragma_table_info`, so the reader never hard-codes a table's shape.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::core::identifier::{quote_list, quote_sqlite};
use crate::core::{LegacySource, SourceRow, SqlNullType, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only reader over a legacy SQLite file.
pub struct SqliteSource {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteSource {
    /// Open the legacy store at `path`.
    ///
    /// Fails with [`MigrateError::LegacyStoreMissing`] when the file does not
    /// exist; the file is never created.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrateError::LegacyStoreMissing(path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "opening legacy SQLite store"))?;

        // Reading the schema forces SQLite to parse the file header.
        if let Err(e) = sqlx::query("SELECT count(*) FROM sqlite_master")
            .fetch_one(&pool)
            .await
        {
            pool.close().await;
            return Err(MigrateError::pool(e, "reading legacy SQLite store"));
        }

        info!("Opened legacy store: {}", path.display());

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Path of the legacy store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convert a row to values using each value's storage class.
    ///
    /// SQLite column declarations are advisory, so the declared type is
    /// ignored and the stored type decides the variant.
    fn row_to_values(row: &SqliteRow) -> Result<Vec<SqlValue>> {
        let mut values = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                values.push(SqlValue::Null(SqlNullType::Untyped));
                continue;
            }

            let storage = raw.type_info().name().to_ascii_uppercase();
            let value = match storage.as_str() {
                "INTEGER" => SqlValue::I64(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => SqlValue::F64(row.try_get_unchecked::<f64, _>(idx)?),
                "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
            };
            values.push(value);
        }
        Ok(values)
    }
}

#[async_trait]
impl LegacySource for SqliteSource {
    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("{}: {} columns {:?}", table, columns.len(), columns);
        Ok(columns)
    }

    async fn select_all(&self, table: &str, columns: &[String]) -> Result<Vec<SourceRow>> {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let sql = format!(
            "SELECT {} FROM {}",
            quote_list(&names, quote_sqlite)?,
            quote_sqlite(table)?
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| Self::row_to_values(row).map(SourceRow::new))
            .collect()
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite(table)?);
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed legacy store: {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_sqlite;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_missing_file_fails_without_creating_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");

        let err = SqliteSource::open(&path).await.err().unwrap();
        assert!(matches!(err, MigrateError::LegacyStoreMissing(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_rejects_file_that_is_not_a_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");
        std::fs::write(&path, "CLIENTNAME,Type,St\nAcme,RET,A\n".repeat(64)).unwrap();

        let err = SqliteSource::open(&path).await.err().unwrap();
        assert!(matches!(err, MigrateError::Pool { .. }), "{}", err);
    }

    #[tokio::test]
    async fn test_open_accepts_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");
        std::fs::File::create(&path).unwrap();

        let source = SqliteSource::open(&path).await.unwrap();
        assert!(source.list_tables().await.unwrap().is_empty());
        source.close().await;
    }

    #[tokio::test]
    async fn test_introspects_columns_in_declared_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");
        seed_sqlite(
            &path,
            &["CREATE TABLE ClientsData (St TEXT, CLIENTNAME TEXT, Type TEXT, Activity TEXT)"],
        )
        .await;

        let source = SqliteSource::open(&path).await.unwrap();
        let columns = source.column_names("ClientsData").await.unwrap();
        assert_eq!(columns, vec!["St", "CLIENTNAME", "Type", "Activity"]);
        assert!(source.column_names("Missing").await.unwrap().is_empty());
        source.close().await;
    }

    #[tokio::test]
    async fn test_select_uses_storage_class() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");
        seed_sqlite(
            &path,
            &[
                "CREATE TABLE HistData (Year INTEGER, WorkingHours REAL, NOTES TEXT, Raw BLOB)",
                "INSERT INTO HistData VALUES (2021, 7.5, 'note', x'0102')",
                "INSERT INTO HistData VALUES ('2022', NULL, 3, NULL)",
            ],
        )
        .await;

        let source = SqliteSource::open(&path).await.unwrap();
        let columns = source.column_names("HistData").await.unwrap();
        let rows = source.select_all("HistData", &columns).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].values,
            vec![
                SqlValue::I64(2021),
                SqlValue::F64(7.5),
                SqlValue::from("note"),
                SqlValue::Bytes(vec![1, 2]),
            ]
        );
        // Column affinity converts '2022' to an integer on insert.
        assert_eq!(rows[1].values[0], SqlValue::I64(2022));
        assert!(rows[1].values[1].is_null());
        // TEXT affinity stores 3 as text.
        assert_eq!(rows[1].values[2], SqlValue::from("3"));

        assert_eq!(source.row_count("HistData").await.unwrap(), 2);
        source.close().await;
    }

    #[tokio::test]
    async fn test_list_tables_skips_internal_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("FFNT.sqlite");
        seed_sqlite(
            &path,
            &[
                "CREATE TABLE PagePermissions (User TEXT, Page TEXT, Access TEXT)",
                "CREATE TABLE ClientsData (id INTEGER PRIMARY KEY AUTOINCREMENT, CLIENTNAME TEXT)",
            ],
        )
        .await;

        let source = SqliteSource::open(&path).await.unwrap();
        let tables = source.list_tables().await.unwrap();
        assert_eq!(tables, vec!["ClientsData", "PagePermissions"]);
        source.close().await;
    }
}
