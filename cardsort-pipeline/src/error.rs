//! Error types for cardsort-pipeline

use cardsort_arm::ArmError;
use cardsort_eye::VisionError;
use cardsort_storage::StorageError;
use thiserror::Error;

/// Failures that prevent a batch from starting.
///
/// Once a batch is running, faults are reported through the batch summary.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Startup failed: {0}")]
    Startup(ArmError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_display() {
        let err = PipelineError::Startup(ArmError::Connection("/dev/ttyUSB0: no such device".to_string()));
        let text = err.to_string();
        assert!(text.starts_with("Startup failed"));
        assert!(text.contains("/dev/ttyUSB0"));
    }

    #[test]
    fn test_error_from_storage() {
        let err: PipelineError = StorageError::Unsupported("backup".to_string()).into();
        match err {
            PipelineError::Storage(_) => {}
            _ => panic!("Expected Storage error"),
        }
    }
}
