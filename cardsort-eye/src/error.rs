//! Error types for cardsort-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::DeviceUnavailable("/dev/video0 busy".to_string());
        assert!(err.to_string().contains("Device unavailable"));
        assert!(err.to_string().contains("/dev/video0"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        match vision_err {
            VisionError::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
