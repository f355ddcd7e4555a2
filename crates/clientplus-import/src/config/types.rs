//! Configuration type definitions.
//!
//! Every field has a default, and the defaults reproduce the legacy import
//! script: read `FFNT.sqlite` from the working directory, write into the web
//! application's `db.sqlite3`, batches of 1000, the five standard tables.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::FieldMapping;
use crate::entity::ENTITY_NAMES;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Legacy store (SQLite) configuration.
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// Destination database configuration.
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Legacy store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Path to the legacy SQLite file (default: "FFNT.sqlite").
    #[serde(default = "default_legacy_path")]
    pub path: PathBuf,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            path: default_legacy_path(),
        }
    }
}

/// Kind of destination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    Postgres,
    /// The web application's default database file.
    #[default]
    Sqlite,
    /// In-memory store; nothing is persisted (dry runs).
    Memory,
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DestinationType::Postgres => "postgres",
            DestinationType::Sqlite => "sqlite",
            DestinationType::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Destination database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Store type (default: sqlite).
    #[serde(default)]
    pub r#type: DestinationType,

    /// PostgreSQL host.
    #[serde(default)]
    pub host: String,

    /// PostgreSQL port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// PostgreSQL database name.
    #[serde(default)]
    pub database: String,

    /// PostgreSQL username.
    #[serde(default)]
    pub user: String,

    /// PostgreSQL password.
    #[serde(default)]
    pub password: String,

    /// PostgreSQL schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SQLite database file (default: "db.sqlite3").
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,

    /// Maximum destination connections (default: 2).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Prefix of destination table names (default: "myapp_").
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            r#type: DestinationType::default(),
            host: String::new(),
            port: default_pg_port(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            schema: default_public_schema(),
            path: default_sqlite_path(),
            max_connections: default_max_connections(),
            table_prefix: default_table_prefix(),
        }
    }
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("path", &self.path)
            .field("max_connections", &self.max_connections)
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per bulk insert (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Create destination tables that do not exist yet (default: false).
    #[serde(default)]
    pub create_missing_tables: bool,

    /// Ordered table list. The built-in list is used when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableConfig>>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            create_missing_tables: false,
            tables: None,
        }
    }
}

impl MigrationConfig {
    /// Configured table list, or the built-in one.
    pub fn get_tables(&self) -> Vec<TableConfig> {
        self.tables.clone().unwrap_or_else(default_tables)
    }
}

/// One legacy table to migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Legacy table name.
    pub source: String,

    /// Destination entity type name.
    pub entity: String,

    /// Column renames (identity when empty).
    #[serde(default, skip_serializing_if = "FieldMapping::is_empty")]
    pub field_mapping: FieldMapping,
}

impl TableConfig {
    pub fn new(source: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entity: entity.into(),
            field_mapping: FieldMapping::new(),
        }
    }
}

/// The legacy tables, in the order the original import ran them.
pub fn default_tables() -> Vec<TableConfig> {
    const SOURCES: [&str; 5] = [
        "ClientsData",
        "HistData",
        "ConsultantDeal",
        "ConsultantVacation",
        "PagePermissions",
    ];
    SOURCES
        .iter()
        .zip(ENTITY_NAMES.iter())
        .map(|(source, entity)| TableConfig::new(*source, *entity))
        .collect()
}

// Default value functions
fn default_legacy_path() -> PathBuf {
    PathBuf::from("FFNT.sqlite")
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("db.sqlite3")
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    2
}

fn default_table_prefix() -> String {
    "myapp_".to_string()
}

fn default_batch_size() -> usize {
    1000
}
