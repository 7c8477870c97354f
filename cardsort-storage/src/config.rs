//! Configuration for cardsort-storage

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON-lines file holding every scan record
    pub path: PathBuf,
    /// Where backups go; `backups/` next to the store when unset
    pub backup_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/scans.jsonl"),
            backup_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .map(|p| p.join("backups"))
                .unwrap_or_else(|| PathBuf::from("backups")),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("Storage path must not be empty".to_string());
        }
        if self.path.file_name().is_none() {
            return Err(format!(
                "Storage path {} does not name a file",
                self.path.display()
            ));
        }
        Ok(())
    }
}
