//! In-memory dedup store for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::BaseDedupStore;
use crate::types::ProcessedRecord;

/// In-memory dedup store.
///
/// Same upsert semantics as the SQLite store, plus failure injection so tests
/// can exercise store outages. Data is lost on drop.
#[derive(Default)]
pub struct MemoryDedupStore {
    records: RwLock<HashMap<String, ProcessedRecord>>,
    failing_reads: RwLock<HashSet<String>>,
    failing_writes: RwLock<HashSet<String>>,
    initialized: RwLock<bool>,
    writes: RwLock<usize>,
}

impl MemoryDedupStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a record, as if an earlier run had processed it.
    pub fn with_processed(self, identity: &str, title: &str) -> Self {
        self.records.write().unwrap().insert(
            identity.to_string(),
            ProcessedRecord {
                identity: identity.to_string(),
                title: title.to_string(),
                processed_at: Utc::now(),
            },
        );
        self
    }

    /// Make `is_processed` fail for `identity`.
    pub fn fail_reads_for(self, identity: &str) -> Self {
        self.failing_reads.write().unwrap().insert(identity.to_string());
        self
    }

    /// Make `mark_processed` fail for `identity`.
    pub fn fail_writes_for(self, identity: &str) -> Self {
        self.failing_writes.write().unwrap().insert(identity.to_string());
        self
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.read().unwrap()
    }

    /// Number of successful `mark_processed` calls.
    pub fn write_count(&self) -> usize {
        *self.writes.read().unwrap()
    }

    /// Snapshot of stored identities.
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl BaseDedupStore for MemoryDedupStore {
    async fn initialize(&self) -> StoreResult<()> {
        *self.initialized.write().unwrap() = true;
        Ok(())
    }

    async fn is_processed(&self, identity: &str) -> StoreResult<bool> {
        if self.failing_reads.read().unwrap().contains(identity) {
            return Err(StoreError::Unavailable(format!("read of {}", identity)));
        }
        Ok(self.records.read().unwrap().contains_key(identity))
    }

    async fn mark_processed(
        &self,
        identity: &str,
        title: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if self.failing_writes.read().unwrap().contains(identity) {
            return Err(StoreError::Unavailable(format!("write of {}", identity)));
        }
        self.records.write().unwrap().insert(
            identity.to_string(),
            ProcessedRecord {
                identity: identity.to_string(),
                title: title.to_string(),
                processed_at,
            },
        );
        *self.writes.write().unwrap() += 1;
        Ok(())
    }

    async fn get(&self, identity: &str) -> StoreResult<Option<ProcessedRecord>> {
        Ok(self.records.read().unwrap().get(identity).cloned())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.records.read().unwrap().len())
    }
}
