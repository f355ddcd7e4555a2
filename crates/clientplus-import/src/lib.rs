//! # clientplus-import
//!
//! Bulk migration of the legacy `FFNT.sqlite` tables into the ClientPlus
//! database.
//!
//! Each configured legacy table is migrated into one destination entity
//! collection:
//!
//! - **Replace semantics**: the collection is cleared before the table's rows
//!   are written, so re-running converges on the same state
//! - **Batched writes**: rows are inserted in bulk, 1000 at a time by default
//! - **Field mapping**: legacy column names can be renamed per table
//! - **Failure isolation**: a failing table is reported and the run moves on
//! - **Destinations**: PostgreSQL, SQLite, or memory for dry runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use clientplus_import::{Config, MigrationDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let report = MigrationDriver::new(config).run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod entity;
pub mod error;
pub mod migrator;
pub mod orchestrator;
pub mod source;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use config::{Config, DestinationConfig, DestinationType, MigrationConfig, TableConfig};
pub use crate::core::{DestinationStore, FieldMapping, LegacySource, SqlValue};
pub use entity::{EntityRow, EntitySchema};
pub use error::{MigrateError, Result};
pub use migrator::{MigrationResult, TableMigrator};
pub use orchestrator::{HealthReport, MigrationDriver, RunReport, TableJob, TableValidation};
pub use source::SqliteSource;
pub use target::{MemoryStore, PgStore, SqliteStore};
