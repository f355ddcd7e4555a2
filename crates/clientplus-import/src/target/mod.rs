//! Destination stores.
//!
//! Three implementations of [`DestinationStore`]:
//! - [`PgStore`]: the production PostgreSQL database (deadpool-postgres)
//! - [`SqliteStore`]: the web application's default `db.sqlite3` (SQLx)
//! - [`MemoryStore`]: keeps rows in memory, used for dry runs and tests

mod memory;
mod postgres;
mod sqlite;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use tracing::info;

use crate::config::{DestinationConfig, DestinationType};
use crate::core::DestinationStore;
use crate::entity::{EntitySchema, FieldKind, FieldSpec};
use crate::error::Result;

/// Connect to the configured destination.
///
/// `create_missing` lets a SQLite destination file be created when absent.
pub async fn connect(
    config: &DestinationConfig,
    create_missing: bool,
) -> Result<Box<dyn DestinationStore>> {
    info!("Connecting to destination: {}", config.describe());
    let store: Box<dyn DestinationStore> = match config.r#type {
        DestinationType::Postgres => Box::new(PgStore::new(config).await?),
        DestinationType::Sqlite => Box::new(
            SqliteStore::open(&config.path, config.max_connections, create_missing).await?,
        ),
        DestinationType::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Largest number of rows per INSERT statement that keeps the bound
/// parameter count under `max_params`.
fn rows_per_statement(columns: usize, max_params: usize) -> usize {
    (max_params / columns.max(1)).max(1)
}

/// Column definition shared by the SQL dialects, given the dialect's
/// auto-id clause and decimal type name.
fn column_ddl(spec: &FieldSpec, quoted: &str, auto_id: &str, decimal: &str) -> String {
    let ty = match &spec.kind {
        FieldKind::AutoId => return format!("{} {}", quoted, auto_id),
        FieldKind::Integer => "integer".to_string(),
        FieldKind::Text {
            max_length: Some(n),
        } => format!("varchar({})", n),
        FieldKind::Text { max_length: None } => "text".to_string(),
        FieldKind::Decimal {
            max_digits,
            decimal_places,
        } => format!("{}({}, {})", decimal, max_digits, decimal_places),
    };
    let null = if spec.nullable { "NULL" } else { "NOT NULL" };
    format!("{} {} {}", quoted, ty, null)
}

/// `CREATE TABLE IF NOT EXISTS` for an entity.
fn create_table_ddl(
    entity: &EntitySchema,
    qualified: &str,
    quote: fn(&str) -> Result<String>,
    auto_id: &str,
    decimal: &str,
) -> Result<String> {
    let columns = entity
        .fields()
        .iter()
        .map(|spec| Ok(column_ddl(spec, &quote(&spec.name)?, auto_id, decimal)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualified,
        columns.join(",\n    ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::quote_pg;
    use crate::entity;

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(12, 32766), 2730);
        assert_eq!(rows_per_statement(0, 100), 100);
        assert_eq!(rows_per_statement(200, 100), 1);
    }

    #[test]
    fn test_create_table_ddl() {
        let schema = entity::hist_data("myapp_");
        let ddl = create_table_ddl(
            &schema,
            "\"public\".\"myapp_histdata\"",
            quote_pg,
            "serial PRIMARY KEY",
            "numeric",
        )
        .unwrap();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"myapp_histdata\""));
        assert!(ddl.contains("\"id\" serial PRIMARY KEY"));
        assert!(ddl.contains("\"Source\" varchar(50) NOT NULL"));
        assert!(ddl.contains("\"WorkingHours\" numeric(5, 2) NOT NULL"));
        assert!(ddl.contains("\"NOTES\" text NULL"));
    }
}
