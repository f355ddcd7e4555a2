//! In-memory destination store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::core::DestinationStore;
use crate::entity::{EntityRow, EntitySchema};
use crate::error::Result;

#[derive(Default)]
struct Collection {
    rows: Vec<EntityRow>,
    next_id: i64,
    /// Size of every bulk insert, in call order.
    batches: Vec<usize>,
}

/// Destination that keeps every collection in memory.
///
/// Assigns ids like an auto-increment column: rows without an id get one
/// past the largest id seen so far.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        // A panicking test thread must not hide the rows from later assertions.
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of a collection's rows.
    pub fn rows(&self, collection: &str) -> Vec<EntityRow> {
        self.lock()
            .get(collection)
            .map(|c| c.rows.clone())
            .unwrap_or_default()
    }

    /// Row count of every bulk insert into a collection, in call order.
    pub fn batch_sizes(&self, collection: &str) -> Vec<usize> {
        self.lock()
            .get(collection)
            .map(|c| c.batches.clone())
            .unwrap_or_default()
    }

    /// Insert rows directly, bypassing batch bookkeeping.
    pub fn seed(&self, collection: &str, rows: Vec<EntityRow>) {
        let mut guard = self.lock();
        let target = guard.entry(collection.to_string()).or_default();
        for row in rows {
            target.push(row);
        }
    }
}

impl Collection {
    fn push(&mut self, mut row: EntityRow) {
        match row.id() {
            Some(id) => self.next_id = self.next_id.max(id),
            None => {
                self.next_id += 1;
                row.assign_id(self.next_id);
            }
        }
        self.rows.push(row);
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn delete_all(&self, entity: &EntitySchema) -> Result<u64> {
        let mut guard = self.lock();
        let deleted = match guard.get_mut(entity.collection()) {
            Some(c) => {
                let n = c.rows.len() as u64;
                c.rows.clear();
                n
            }
            None => 0,
        };
        debug!("Deleted {} rows from {}", deleted, entity.collection());
        Ok(deleted)
    }

    async fn bulk_insert(&self, entity: &EntitySchema, rows: &[EntityRow]) -> Result<u64> {
        let mut guard = self.lock();
        let target = guard.entry(entity.collection().to_string()).or_default();
        target.batches.push(rows.len());
        for row in rows {
            target.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn count(&self, entity: &EntitySchema) -> Result<i64> {
        Ok(self
            .lock()
            .get(entity.collection())
            .map(|c| c.rows.len() as i64)
            .unwrap_or(0))
    }

    async fn ensure_collection(&self, entity: &EntitySchema) -> Result<()> {
        self.lock()
            .entry(entity.collection().to_string())
            .or_default();
        Ok(())
    }

    fn store_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
