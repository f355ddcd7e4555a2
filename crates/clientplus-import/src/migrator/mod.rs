//! Single-table migration: introspect, select, clear, build, batched insert.
//!
//! [`TableMigrator::migrate`] never returns an error. Every failure is caught
//! at the table boundary and reported in the [`MigrationResult`], so one bad
//! table does not stop the tables after it.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::core::{DestinationStore, FieldMapping, LegacySource};
use crate::entity::{EntityRow, EntitySchema};
use crate::error::{TableError, TableErrorKind};

/// Rows per bulk insert when not configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome of one table migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Legacy table name.
    pub table: String,

    /// Destination entity type.
    pub entity: String,

    /// Destination collection.
    pub collection: String,

    /// Rows selected from the legacy table.
    pub rows_read: u64,

    /// Rows committed to the destination.
    pub rows_written: u64,

    /// Bulk inserts committed.
    pub batches: usize,

    /// Wall time in milliseconds.
    pub duration_ms: u64,

    /// Set when the migration failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TableFailure>,
}

/// Why a table migration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFailure {
    pub kind: TableErrorKind,
    pub message: String,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON progress line printed to stderr when progress output is enabled.
#[derive(Debug, Serialize)]
struct ProgressUpdate<'a> {
    table: &'a str,
    collection: &'a str,
    rows_written: u64,
    rows_total: u64,
    batches: usize,
    done: bool,
}

/// Counters of a migration in flight.
#[derive(Default)]
struct Progress {
    rows_read: u64,
    rows_written: u64,
    batches: usize,
}

/// Migrates one legacy table into one destination collection.
pub struct TableMigrator<'a> {
    source: &'a dyn LegacySource,
    destination: &'a dyn DestinationStore,
    batch_size: usize,
    progress: bool,
}

impl<'a> TableMigrator<'a> {
    pub fn new(source: &'a dyn LegacySource, destination: &'a dyn DestinationStore) -> Self {
        Self {
            source,
            destination,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: false,
        }
    }

    /// Rows per bulk insert. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Print JSON progress lines to stderr.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Replace the contents of `entity`'s collection with the rows of `table`.
    pub async fn migrate(
        &self,
        table: &str,
        entity: &EntitySchema,
        mapping: &FieldMapping,
    ) -> MigrationResult {
        let start = Instant::now();
        let mut progress = Progress::default();

        info!("{} -> {}: starting", table, entity.collection());
        let outcome = self.try_migrate(table, entity, mapping, &mut progress).await;

        let error = match outcome {
            Ok(()) => {
                info!(
                    "{} -> {}: migrated {} rows in {} batches",
                    table,
                    entity.collection(),
                    progress.rows_written,
                    progress.batches
                );
                None
            }
            Err(e) => {
                let mut message = e.to_string();
                // Bulk insert failures already report committed rows.
                if progress.rows_written > 0 && e.kind() != TableErrorKind::BulkInsert {
                    message.push_str(&format!(
                        " ({} rows already written to {} remain)",
                        progress.rows_written,
                        entity.collection()
                    ));
                }
                error!("{} -> {}: {}", table, entity.collection(), message);
                Some(TableFailure {
                    kind: e.kind(),
                    message,
                })
            }
        };

        MigrationResult {
            table: table.to_string(),
            entity: entity.name().to_string(),
            collection: entity.collection().to_string(),
            rows_read: progress.rows_read,
            rows_written: progress.rows_written,
            batches: progress.batches,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
        }
    }

    async fn try_migrate(
        &self,
        table: &str,
        entity: &EntitySchema,
        mapping: &FieldMapping,
        progress: &mut Progress,
    ) -> Result<(), TableError> {
        let columns = self
            .source
            .column_names(table)
            .await
            .map_err(|source| TableError::Introspection {
                table: table.to_string(),
                source,
            })?;
        if columns.is_empty() {
            return Err(TableError::MissingTable {
                table: table.to_string(),
            });
        }

        let rows = self
            .source
            .select_all(table, &columns)
            .await
            .map_err(|source| TableError::Select {
                table: table.to_string(),
                source,
            })?;
        progress.rows_read = rows.len() as u64;
        debug!("{}: read {} rows", table, rows.len());

        let deleted = self
            .destination
            .delete_all(entity)
            .await
            .map_err(|source| TableError::Clear {
                collection: entity.collection().to_string(),
                source,
            })?;
        debug!("{}: cleared {} rows", entity.collection(), deleted);

        let fields = mapping.resolve(table, &columns);
        let mut buffer = Vec::with_capacity(self.batch_size.min(rows.len()));

        for (idx, row) in rows.into_iter().enumerate() {
            let record = mapping.apply(&fields, row);
            let entity_row = entity
                .build(record)
                .map_err(|source| TableError::Construction {
                    row: idx as u64 + 1,
                    source,
                })?;
            buffer.push(entity_row);

            if buffer.len() >= self.batch_size {
                self.flush(table, entity, &mut buffer, progress).await?;
            }
        }

        if !buffer.is_empty() {
            self.flush(table, entity, &mut buffer, progress).await?;
        }

        self.report(table, entity, progress, true);
        Ok(())
    }

    async fn flush(
        &self,
        table: &str,
        entity: &EntitySchema,
        buffer: &mut Vec<EntityRow>,
        progress: &mut Progress,
    ) -> Result<(), TableError> {
        let written = self
            .destination
            .bulk_insert(entity, buffer)
            .await
            .map_err(|source| TableError::BulkInsert {
                collection: entity.collection().to_string(),
                batch: progress.batches + 1,
                rows_committed: progress.rows_written,
                source,
            })?;
        buffer.clear();

        progress.rows_written += written;
        progress.batches += 1;
        info!(
            "{} -> {}: {} rows written",
            table,
            entity.collection(),
            progress.rows_written
        );
        self.report(table, entity, progress, false);
        Ok(())
    }

    fn report(&self, table: &str, entity: &EntitySchema, progress: &Progress, done: bool) {
        if !self.progress {
            return;
        }
        let update = ProgressUpdate {
            table,
            collection: entity.collection(),
            rows_written: progress.rows_written,
            rows_total: progress.rows_read,
            batches: progress.batches,
            done,
        };
        if let Ok(json) = serde_json::to_string(&update) {
            eprintln!("{}", json);
        }
    }
}
