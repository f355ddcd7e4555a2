//! Migration driver - runs the configured table jobs in order.

use crate::config::Config;
use crate::core::{DestinationStore, FieldMapping, LegacySource};
use crate::entity::{self, EntitySchema};
use crate::error::{MigrateError, Result};
use crate::migrator::{MigrationResult, TableMigrator};
use crate::source::SqliteSource;
use crate::target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// One legacy table and the entity it migrates into.
#[derive(Debug, Clone)]
pub struct TableJob {
    pub source_table: String,
    pub entity: EntitySchema,
    pub field_mapping: FieldMapping,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// SHA256 of the configuration, password excluded.
    pub config_hash: String,

    /// Legacy store file.
    pub legacy_path: PathBuf,

    /// Destination description.
    pub destination: String,

    /// Per-table results, in job order.
    pub tables: Vec<MigrationResult>,

    /// Total rows written across all tables.
    pub rows_written: u64,

    /// True when every table succeeded.
    pub success: bool,
}

impl RunReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Source tables whose migration failed.
    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| !t.is_success())
            .map(|t| t.table.as_str())
            .collect()
    }

    /// One-line outcome.
    pub fn summary(&self) -> String {
        if self.success {
            format!(
                "Migration completed: all {} tables succeeded, {} rows written",
                self.tables.len(),
                self.rows_written
            )
        } else {
            format!(
                "Migration completed with errors: {} of {} tables failed ({})",
                self.failed_tables().len(),
                self.tables.len(),
                self.failed_tables().join(", ")
            )
        }
    }
}

/// Row counts of one job after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableValidation {
    pub table: String,
    pub collection: String,
    pub source_rows: i64,
    pub destination_rows: i64,
    pub matches: bool,
}

/// Reachability of both stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    pub legacy_path: PathBuf,
    pub legacy_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_error: Option<String>,
    /// Configured source tables absent from the legacy store.
    pub missing_tables: Vec<String>,
    pub destination: String,
    pub destination_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_error: Option<String>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.legacy_ok && self.destination_ok && self.missing_tables.is_empty()
    }
}

/// Migration driver.
pub struct MigrationDriver {
    config: Config,
    progress: bool,
}

impl MigrationDriver {
    /// Create a new driver.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            progress: false,
        }
    }

    /// Print JSON progress lines to stderr.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the ordered job list.
    pub fn plan(&self) -> Result<Vec<TableJob>> {
        let prefix = &self.config.destination.table_prefix;
        self.config
            .migration
            .get_tables()
            .into_iter()
            .map(|table| {
                let entity = entity::builtin(&table.entity, prefix).ok_or_else(|| {
                    MigrateError::Config(format!("unknown entity type: {}", table.entity))
                })?;
                Ok(TableJob {
                    source_table: table.source,
                    entity,
                    field_mapping: table.field_mapping,
                })
            })
            .collect()
    }

    fn check_legacy_store(&self) -> Result<()> {
        let path = &self.config.legacy.path;
        if !path.exists() {
            error!("Legacy store not found: {}", path.display());
            return Err(MigrateError::LegacyStoreMissing(path.clone()));
        }
        Ok(())
    }

    /// Run every job against the configured destination.
    pub async fn run(&self) -> Result<RunReport> {
        let (source, jobs) = self.open_legacy_store().await?;

        let destination = match target::connect(
            &self.config.destination,
            self.config.migration.create_missing_tables,
        )
        .await
        {
            Ok(destination) => destination,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        let report = self.run_jobs(&source, &jobs, destination.as_ref()).await;
        destination.close().await;
        report
    }

    /// Run every job against an already open destination.
    pub async fn run_into(&self, destination: &dyn DestinationStore) -> Result<RunReport> {
        let (source, jobs) = self.open_legacy_store().await?;
        self.run_jobs(&source, &jobs, destination).await
    }

    /// Check the legacy store, resolve the jobs, then open the store.
    ///
    /// Runs before the destination is touched, so a missing or unreadable
    /// legacy file leaves the destination as it was.
    async fn open_legacy_store(&self) -> Result<(SqliteSource, Vec<TableJob>)> {
        self.check_legacy_store()?;
        let jobs = self.plan()?;
        let source = SqliteSource::open(&self.config.legacy.path)
            .await
            .map_err(|e| {
                error!(
                    "Cannot open legacy store {}: {}",
                    self.config.legacy.path.display(),
                    e
                );
                e
            })?;
        Ok((source, jobs))
    }

    /// Run `jobs` and close `source` exactly once, whatever the outcome.
    pub async fn run_jobs(
        &self,
        source: &dyn LegacySource,
        jobs: &[TableJob],
        destination: &dyn DestinationStore,
    ) -> Result<RunReport> {
        let report = self.run_with(source, jobs, destination).await;
        source.close().await;
        report
    }

    /// Run `jobs` sequentially. The caller owns and closes both stores;
    /// see [`MigrationDriver::run_jobs`] for a variant that closes the source.
    pub async fn run_with(
        &self,
        source: &dyn LegacySource,
        jobs: &[TableJob],
        destination: &dyn DestinationStore,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting migration run {}: {} tables into {}",
            run_id,
            jobs.len(),
            destination.store_type()
        );

        if self.config.migration.create_missing_tables {
            for job in jobs {
                destination.ensure_collection(&job.entity).await?;
            }
        }

        let migrator = TableMigrator::new(source, destination)
            .with_batch_size(self.config.migration.batch_size)
            .with_progress(self.progress);

        let mut results = Vec::with_capacity(jobs.len());
        let mut success = true;
        for job in jobs {
            let result = migrator
                .migrate(&job.source_table, &job.entity, &job.field_mapping)
                .await;
            if result.is_success() {
                if let Err(e) = destination.finalize(&job.entity).await {
                    warn!("Failed to finalize {}: {}", job.entity.collection(), e);
                }
            } else {
                success = false;
            }
            results.push(result);
        }

        let completed_at = Utc::now();
        let report = RunReport {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            config_hash: self.config.hash(),
            legacy_path: self.config.legacy.path.clone(),
            destination: self.config.destination.describe(),
            rows_written: results.iter().map(|r| r.rows_written).sum(),
            tables: results,
            success,
        };

        if report.success {
            info!("{}", report.summary());
        } else {
            warn!("{}", report.summary());
        }
        Ok(report)
    }

    /// Compare legacy and destination row counts per job.
    pub async fn validate(&self) -> Result<Vec<TableValidation>> {
        let (source, jobs) = self.open_legacy_store().await?;
        let destination = match target::connect(&self.config.destination, false).await {
            Ok(destination) => destination,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        let results = validate_counts(&source, destination.as_ref(), &jobs).await;

        source.close().await;
        destination.close().await;
        results
    }

    /// Check that both stores are reachable.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let jobs = self.plan()?;
        let mut report = HealthReport {
            legacy_path: self.config.legacy.path.clone(),
            destination: self.config.destination.describe(),
            ..HealthReport::default()
        };

        match SqliteSource::open(&self.config.legacy.path).await {
            Ok(source) => {
                report.legacy_ok = true;
                match source.list_tables().await {
                    Ok(existing) => {
                        report.missing_tables = jobs
                            .iter()
                            .filter(|job| !existing.contains(&job.source_table))
                            .map(|job| job.source_table.clone())
                            .collect();
                    }
                    Err(e) => {
                        report.legacy_ok = false;
                        report.legacy_error = Some(e.to_string());
                    }
                }
                source.close().await;
            }
            Err(e) => report.legacy_error = Some(e.to_string()),
        }

        match target::connect(&self.config.destination, false).await {
            Ok(destination) => {
                report.destination_ok = true;
                destination.close().await;
            }
            Err(e) => report.destination_error = Some(e.to_string()),
        }

        debug!("Health check: {:?}", report);
        Ok(report)
    }
}

async fn validate_counts(
    source: &dyn LegacySource,
    destination: &dyn DestinationStore,
    jobs: &[TableJob],
) -> Result<Vec<TableValidation>> {
    let mut results = Vec::with_capacity(jobs.len());
    for job in jobs {
        let source_rows = source.row_count(&job.source_table).await?;
        let destination_rows = destination.count(&job.entity).await?;
        let matches = source_rows == destination_rows;

        if matches {
            info!("{}: {} rows (match)", job.source_table, source_rows);
        } else {
            warn!(
                "{}: source={} destination={} (MISMATCH)",
                job.source_table, source_rows, destination_rows
            );
        }

        results.push(TableValidation {
            table: job.source_table.clone(),
            collection: job.entity.collection().to_string(),
            source_rows,
            destination_rows,
            matches,
        });
    }
    Ok(results)
}
