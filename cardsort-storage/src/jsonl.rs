//! JSON-lines file store

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::query::ScanQuery;
use crate::store::ScanStore;
use async_trait::async_trait;
use cardsort_core::{RecordId, ScanRecord};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One JSON object per line, appended and synced record by record.
///
/// The file is only opened for writing on the first append, so read-only
/// users (statistics, search) never create or lock it.
pub struct JsonlScanStore {
    path: PathBuf,
    backup_dir: PathBuf,
    writer: Mutex<Option<File>>,
}

impl JsonlScanStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.path.clone(), config.backup_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_writer(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        // A crash mid-append leaves a line without its newline; terminate it
        // so the next record starts on a line of its own
        let len = file.metadata().await?.len();
        if len > 0 {
            file.seek(SeekFrom::Start(len - 1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                warn!("{} ends with a torn record, terminating it", self.path.display());
                file.write_all(b"\n").await?;
            }
        }

        info!("Appending scan records to {}", self.path.display());
        Ok(file)
    }

    async fn read_all(&self) -> Result<Vec<ScanRecord>, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StorageError::Corrupt(format!(
                    "{} is not valid UTF-8",
                    self.path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ScanRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable record at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ScanStore for JsonlScanStore {
    async fn append(&self, record: ScanRecord) -> Result<RecordId, StorageError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        if writer.is_none() {
            *writer = Some(self.open_writer().await?);
        }
        let Some(file) = writer.as_mut() else {
            return Err(StorageError::Unsupported("writer unavailable".to_string()));
        };

        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        if let Err(e) = written {
            // Part of the line may be on disk; reopening terminates it
            warn!("Append to {} failed, reopening on next write: {}", self.path.display(), e);
            *writer = None;
            return Err(e.into());
        }
        debug!(id = %record.id, card = record.card_index, "Scan record appended");
        Ok(record.id)
    }

    async fn query(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StorageError> {
        let records = self.read_all().await?;
        Ok(query.apply(records.iter()))
    }

    async fn backup(&self, destination: Option<&Path>) -> Result<PathBuf, StorageError> {
        let target = match destination {
            Some(path) => path.to_path_buf(),
            None => self.backup_dir.join(format!(
                "scans_backup_{}.jsonl",
                Utc::now().format("%Y%m%d_%H%M%S")
            )),
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Hold the writer so the copy never contains half a record
        let _writer = self.writer.lock().await;
        fs::copy(&self.path, &target).await?;
        info!("Backed up {} to {}", self.path.display(), target.display());
        Ok(target)
    }
}
