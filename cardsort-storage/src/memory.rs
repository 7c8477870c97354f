//! In-process store

use crate::error::StorageError;
use crate::query::ScanQuery;
use crate::store::ScanStore;
use async_trait::async_trait;
use cardsort_core::{RecordId, ScanRecord};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Keeps records in memory; used by tests and simulated runs
#[derive(Default)]
pub struct MemoryScanStore {
    records: RwLock<Vec<ScanRecord>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot in append order
    pub fn records(&self) -> Vec<ScanRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ScanStore for MemoryScanStore {
    async fn append(&self, record: ScanRecord) -> Result<RecordId, StorageError> {
        let id = record.id;
        self.records.write().push(record);
        Ok(id)
    }

    async fn query(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StorageError> {
        Ok(query.apply(self.records.read().iter()))
    }

    async fn backup(&self, _destination: Option<&Path>) -> Result<PathBuf, StorageError> {
        Err(StorageError::Unsupported(
            "in-memory store cannot be backed up".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsort_core::CardOutcome;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryScanStore::new();
        let record = ScanRecord::unscanned(Uuid::new_v4(), 1, CardOutcome::PickFailed);
        let id = store.append(record.clone()).await.unwrap();
        assert_eq!(id, record.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0], record);
        assert!(matches!(
            store.backup(None).await,
            Err(StorageError::Unsupported(_))
        ));
    }
}
