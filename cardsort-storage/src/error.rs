//! Error types for cardsort-storage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_from_json() {
        let err: StorageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        match err {
            StorageError::Serialization(_) => {}
            _ => panic!("Expected Serialization error"),
        }
    }
}
