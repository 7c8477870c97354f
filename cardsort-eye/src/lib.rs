//! cardsort-eye: card code recognition
//!
//! Turns frames from a camera into one decision per card. Frames come from a
//! [`FrameSource`], the sharpest one is cropped to the configured ROI and
//! cleaned up, and a [`TextRecognizer`] reads it. The [`RecognitionEngine`]
//! retries with fresh frames until a reading is accepted or the attempt
//! budget runs out.
//!
//! Low confidence and unreadable cards are ordinary results, not errors.

pub mod archive;
pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod ocr;
pub mod processing;
pub mod simulated;
#[cfg(feature = "v4l")]
pub mod v4l_camera;

pub use archive::ImageArchive;
pub use camera::{open_frame_source, CaptureSample, DirectoryFrameSource, FrameSource};
pub use config::{CameraConfig, CameraSource, PreprocessConfig, RecognitionConfig, Roi};
pub use engine::RecognitionEngine;
pub use error::VisionError;
pub use format::CodeFormat;
pub use ocr::{open_recognizer, TesseractRecognizer, TextReading, TextRecognizer};
pub use simulated::{ScriptedFrameSource, ScriptedRecognizer};
#[cfg(feature = "v4l")]
pub use v4l_camera::V4lCamera;
