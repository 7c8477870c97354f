//! Persistence provider

use crate::error::StorageError;
use crate::query::{ScanQuery, ScanStatistics};
use async_trait::async_trait;
use cardsort_core::{RecordId, ScanRecord};
use std::path::{Path, PathBuf};

/// Append-only store of scan records
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist `record`; it is durable once this returns
    async fn append(&self, record: ScanRecord) -> Result<RecordId, StorageError>;

    /// Matching records, newest first
    async fn query(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StorageError>;

    /// Copy the store to `destination`, or to a timestamped file in the
    /// store's backup directory
    async fn backup(&self, destination: Option<&Path>) -> Result<PathBuf, StorageError>;

    async fn statistics(&self) -> Result<ScanStatistics, StorageError> {
        let records = self.query(&ScanQuery::all()).await?;
        Ok(ScanStatistics::from_records(&records))
    }
}
