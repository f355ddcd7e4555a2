//! Error types for the import library.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exit code for configuration errors (invalid YAML, missing fields, etc.).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the legacy store file is missing.
pub const EXIT_LEGACY_MISSING: u8 = 2;
/// Exit code when the run finished but one or more tables failed.
pub const EXIT_TABLE_FAILURES: u8 = 3;
/// Exit code for source or destination database errors.
pub const EXIT_DATABASE_ERROR: u8 = 4;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for import operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The legacy store file does not exist; nothing was migrated.
    #[error("Legacy store not found: {} (no tables were migrated)", .0.display())]
    LegacyStoreMissing(PathBuf),

    /// Legacy store (or SQLite destination) query error
    #[error("SQLite error: {0}")]
    Source(#[from] sqlx::Error),

    /// PostgreSQL destination error
    #[error("Destination database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Identifier rejected before being interpolated into SQL
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Yaml(_)
            | MigrateError::Identifier(_) => EXIT_CONFIG_ERROR,
            MigrateError::LegacyStoreMissing(_) => EXIT_LEGACY_MISSING,
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => {
                EXIT_DATABASE_ERROR
            }
            MigrateError::Io(_) | MigrateError::Json(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Failure while building a destination record from a source row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("{entity} has no field named '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("{entity}.{field} is required but was not supplied")]
    MissingField { entity: String, field: String },

    #[error("{entity}.{field} cannot be NULL")]
    NullNotAllowed { entity: String, field: String },

    #[error("{entity}.{field} expects {expected}, got {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("{entity}.{field} is limited to {max_length} characters, got {length}")]
    TooLong {
        entity: String,
        field: String,
        max_length: usize,
        length: usize,
    },

    #[error("{entity}.{field} value {value} does not fit in {max_digits} digits with {decimal_places} decimal places")]
    Overflow {
        entity: String,
        field: String,
        value: String,
        max_digits: u32,
        decimal_places: u32,
    },
}

/// Where a table migration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorKind {
    Introspection,
    Select,
    Clear,
    Construction,
    BulkInsert,
}

/// Failure scoped to a single table migration.
///
/// Never escapes [`TableMigrator::migrate`](crate::migrator::TableMigrator::migrate);
/// it is converted into a failed [`MigrationResult`](crate::migrator::MigrationResult).
#[derive(Error, Debug)]
pub enum TableError {
    #[error("could not read columns of {table}: {source}")]
    Introspection {
        table: String,
        #[source]
        source: MigrateError,
    },

    #[error("table {table} does not exist in the legacy store")]
    MissingTable { table: String },

    #[error("could not select rows from {table}: {source}")]
    Select {
        table: String,
        #[source]
        source: MigrateError,
    },

    #[error("could not clear {collection}: {source}")]
    Clear {
        collection: String,
        #[source]
        source: MigrateError,
    },

    #[error("row {row}: {source}")]
    Construction {
        row: u64,
        #[source]
        source: ConstructionError,
    },

    #[error(
        "bulk insert of batch {batch} into {collection} failed \
         ({rows_committed} rows from earlier batches remain committed): {source}"
    )]
    BulkInsert {
        collection: String,
        batch: usize,
        rows_committed: u64,
        #[source]
        source: MigrateError,
    },
}

impl TableError {
    /// Failure site, for assertions and reports.
    pub fn kind(&self) -> TableErrorKind {
        match self {
            TableError::Introspection { .. } | TableError::MissingTable { .. } => {
                TableErrorKind::Introspection
            }
            TableError::Select { .. } => TableErrorKind::Select,
            TableError::Clear { .. } => TableErrorKind::Clear,
            TableError::Construction { .. } => TableErrorKind::Construction,
            TableError::BulkInsert { .. } => TableErrorKind::BulkInsert,
        }
    }
}
