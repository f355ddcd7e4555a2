//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DestinationType};
use crate::entity;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Legacy validation
    if config.legacy.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("legacy.path is required".into()));
    }

    // Destination validation
    let dest = &config.destination;
    match dest.r#type {
        DestinationType::Postgres => {
            if dest.host.is_empty() {
                return Err(MigrateError::Config("destination.host is required".into()));
            }
            if dest.database.is_empty() {
                return Err(MigrateError::Config(
                    "destination.database is required".into(),
                ));
            }
            if dest.user.is_empty() {
                return Err(MigrateError::Config("destination.user is required".into()));
            }
            if dest.schema.is_empty() {
                return Err(MigrateError::Config(
                    "destination.schema cannot be empty".into(),
                ));
            }
        }
        DestinationType::Sqlite => {
            if dest.path.as_os_str().is_empty() {
                return Err(MigrateError::Config("destination.path is required".into()));
            }
            if dest.path == config.legacy.path {
                return Err(MigrateError::Config(
                    "legacy and destination cannot be the same database".into(),
                ));
            }
        }
        DestinationType::Memory => {}
    }
    if dest.max_connections == 0 {
        return Err(MigrateError::Config(
            "destination.max_connections must be at least 1".into(),
        ));
    }

    // Migration validation
    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }

    let tables = config.migration.get_tables();
    if tables.is_empty() {
        return Err(MigrateError::Config(
            "migration.tables cannot be empty".into(),
        ));
    }

    let mut entities = HashSet::new();
    for (i, table) in tables.iter().enumerate() {
        if table.source.is_empty() {
            return Err(MigrateError::Config(format!(
                "migration.tables[{}].source is required",
                i
            )));
        }
        let schema = entity::builtin(&table.entity, &dest.table_prefix).ok_or_else(|| {
            MigrateError::Config(format!(
                "migration.tables[{}].entity '{}' is not one of {}",
                i,
                table.entity,
                entity::ENTITY_NAMES.join(", ")
            ))
        })?;
        // Two jobs clearing the same collection would erase each other.
        if !entities.insert(schema.name().to_string()) {
            return Err(MigrateError::Config(format!(
                "migration.tables[{}]: entity {} is listed more than once",
                i,
                schema.name()
            )));
        }

        let mut targets = HashSet::new();
        for (column, field) in table.field_mapping.iter() {
            if column.is_empty() || field.is_empty() {
                return Err(MigrateError::Config(format!(
                    "migration.tables[{}].field_mapping has an empty name",
                    i
                )));
            }
            if !targets.insert(field) {
                return Err(MigrateError::Config(format!(
                    "migration.tables[{}].field_mapping maps more than one column to '{}'",
                    i, field
                )));
            }
        }
    }

    Ok(())
}
