//! cardsort-storage: append-only scan record persistence
//!
//! Records are written once and never updated. The JSON-lines store keeps one
//! record per line so that read-only tooling can inspect the file while a
//! batch is still appending to it.

pub mod config;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod query;
pub mod store;

pub use config::StorageConfig;
pub use error::StorageError;
pub use jsonl::JsonlScanStore;
pub use memory::MemoryScanStore;
pub use query::{ScanQuery, ScanStatistics};
pub use store::ScanStore;
