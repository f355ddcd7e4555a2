//! Core traits for reading the legacy store and writing the destination.
//!
//! - [`LegacySource`]: column introspection and full-table reads
//! - [`DestinationStore`]: per-entity clear and bulk insert
//!
//! The table migrator only ever calls [`LegacySource::column_names`],
//! [`LegacySource::select_all`], [`DestinationStore::delete_all`] and
//! [`DestinationStore::bulk_insert`]; the remaining methods serve the driver
//! and the CLI.

use async_trait::async_trait;

use crate::entity::{EntityRow, EntitySchema};
use crate::error::Result;

use super::record::SourceRow;

/// Read-only access to the legacy relational store.
#[async_trait]
pub trait LegacySource: Send + Sync {
    /// Column names of `table` in declared order.
    ///
    /// Returns an empty list when the table does not exist.
    async fn column_names(&self, table: &str) -> Result<Vec<String>>;

    /// Every row of `table`, selecting `columns` in the given order.
    async fn select_all(&self, table: &str, columns: &[String]) -> Result<Vec<SourceRow>>;

    /// Number of rows in `table`.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Names of all user tables.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Close the connection. Called exactly once by the owner.
    async fn close(&self);
}

/// Write access to one destination database.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Delete every record of the entity's collection.
    ///
    /// Returns the number of records deleted.
    async fn delete_all(&self, entity: &EntitySchema) -> Result<u64>;

    /// Insert `rows` into the entity's collection as one bulk operation,
    /// preserving their order.
    ///
    /// Returns the number of records inserted.
    async fn bulk_insert(&self, entity: &EntitySchema, rows: &[EntityRow]) -> Result<u64>;

    /// Number of records in the entity's collection.
    async fn count(&self, entity: &EntitySchema) -> Result<i64>;

    /// Create the collection if it does not exist.
    async fn ensure_collection(&self, entity: &EntitySchema) -> Result<()>;

    /// Post-load housekeeping (e.g. realigning id sequences).
    async fn finalize(&self, _entity: &EntitySchema) -> Result<()> {
        Ok(())
    }

    /// Store type identifier (e.g., "postgres", "sqlite", "memory").
    fn store_type(&self) -> &str;

    /// Close all connections.
    async fn close(&self);
}
