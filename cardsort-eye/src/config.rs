//! Configuration for cardsort-eye

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraSource {
    /// V4L2 device `/dev/video<index>`
    Device { index: u32 },
    /// Replay still images from a directory
    Directory { path: PathBuf },
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    /// Requested resolution (width, height)
    pub resolution: (u32, u32),
    pub fps: u32,
    /// Upper bound for one `capture(n)` call
    pub capture_timeout_ms: u64,
    /// Pause between consecutive frames of one capture
    pub frame_interval_ms: u64,
    /// Keep a copy of the frames each reading came from
    pub save_images: bool,
    pub image_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::Device { index: 0 },
            resolution: (1920, 1080),
            fps: 30,
            capture_timeout_ms: 5_000,
            frame_interval_ms: 100,
            save_images: true,
            image_dir: PathBuf::from("data/images"),
        }
    }
}

impl CameraConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.fps == 0 || self.fps > 120 {
            return Err("Frame rate must be between 1 and 120".to_string());
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        if self.capture_timeout_ms == 0 {
            return Err("Capture timeout must be greater than 0".to_string());
        }

        if let CameraSource::Device { index } = self.source {
            if index > 100 {
                return Err("Camera index too large (max 100)".to_string());
            }
        }

        if self.save_images && self.image_dir.as_os_str().is_empty() {
            return Err("Image directory must be set when saving images".to_string());
        }

        Ok(())
    }
}

/// Region of interest in frame-relative coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Roi {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl Roi {
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 1.0) {
            return Err("ROI values must lie in [0, 1]".to_string());
        }
        if self.width == 0.0 || self.height == 0.0 {
            return Err("ROI must have a non-zero size".to_string());
        }
        if self.x + self.width > 1.0 + f64::EPSILON || self.y + self.height > 1.0 + f64::EPSILON {
            return Err("ROI must lie inside the frame".to_string());
        }
        Ok(())
    }
}

/// Fixed preprocessing chain switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub grayscale: bool,
    pub denoise: bool,
    /// Gaussian sigma of the denoise pass
    pub denoise_sigma: f32,
    pub contrast_enhance: bool,
    pub adaptive_threshold: bool,
    /// Half-size of the local mean window (window is `2r + 1` pixels wide)
    pub block_radius: u32,
    /// Subtracted from the local mean before comparing
    pub threshold_offset: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            grayscale: true,
            denoise: true,
            denoise_sigma: 1.0,
            contrast_enhance: true,
            adaptive_threshold: true,
            block_radius: 5,
            threshold_offset: 2,
        }
    }
}

/// Recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Text recognizer to use
    pub engine: String,
    pub tesseract_command: String,
    pub languages: Vec<String>,
    pub page_segmentation_mode: u32,
    /// Minimum confidence for an accepted reading
    pub confidence_threshold: f64,
    /// Expected format of a normalized card code
    pub code_pattern: String,
    pub roi: Roi,
    /// Frames captured per attempt
    pub capture_budget: u32,
    /// Attempts per card
    pub attempt_budget: u32,
    /// Upper bound for one recognizer call
    pub inference_timeout_ms: u64,
    pub preprocessing: PreprocessConfig,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            engine: "tesseract".to_string(),
            tesseract_command: "tesseract".to_string(),
            languages: vec!["eng".to_string()],
            page_segmentation_mode: 7,
            confidence_threshold: 0.6,
            code_pattern: r"^[A-Z0-9\-]{5,15}$".to_string(),
            roi: Roi::default(),
            capture_budget: 3,
            attempt_budget: 3,
            inference_timeout_ms: 10_000,
            preprocessing: PreprocessConfig::default(),
        }
    }
}

impl RecognitionConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be in [0, 1]".to_string());
        }

        if self.capture_budget == 0 {
            return Err("Capture budget must be at least 1".to_string());
        }

        if self.attempt_budget == 0 {
            return Err("Attempt budget must be at least 1".to_string());
        }

        if self.inference_timeout_ms == 0 {
            return Err("Inference timeout must be greater than 0".to_string());
        }

        if self.languages.is_empty() {
            return Err("At least one recognition language is required".to_string());
        }

        if self.preprocessing.denoise_sigma <= 0.0 || !self.preprocessing.denoise_sigma.is_finite() {
            return Err("Denoise sigma must be a positive number".to_string());
        }

        if self.preprocessing.block_radius == 0 {
            return Err("Threshold block radius must be at least 1".to_string());
        }

        self.roi.validate()?;

        regex::Regex::new(&self.code_pattern)
            .map_err(|e| format!("Invalid code pattern '{}': {}", self.code_pattern, e))?;

        Ok(())
    }
}
