//! Frame sources

use crate::config::{CameraConfig, CameraSource};
use crate::error::VisionError;
use crate::processing::sharpness;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One frame and its sharpness score
#[derive(Debug, Clone)]
pub struct CaptureSample {
    pub image: DynamicImage,
    /// Laplacian variance of the grayscale frame
    pub quality: f64,
    pub captured_at: DateTime<Utc>,
}

impl CaptureSample {
    pub fn new(image: DynamicImage) -> Self {
        let quality = sharpness(&image.to_luma8());
        Self {
            image,
            quality,
            captured_at: Utc::now(),
        }
    }

    /// Highest-quality sample; the earliest one wins a tie
    pub fn sharpest(samples: Vec<CaptureSample>) -> Option<CaptureSample> {
        samples
            .into_iter()
            .reduce(|best, s| if s.quality > best.quality { s } else { best })
    }
}

/// Vision provider
#[async_trait]
pub trait FrameSource: Send {
    /// Human readable name for logs
    fn describe(&self) -> String;

    /// Capture up to `n` frames.
    ///
    /// Frames that fail individually are skipped; `DeviceUnavailable` is
    /// returned only when none of the `n` could be delivered.
    async fn capture(&mut self, n: u32) -> Result<Vec<CaptureSample>, VisionError>;

    /// Cheap liveness check
    async fn is_alive(&mut self) -> bool;
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Replays still images from a directory, cycling in name order
pub struct DirectoryFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
        }
    }

    fn scan(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    fn refresh(&mut self) {
        if self.files.is_empty() {
            self.files = Self::scan(&self.dir);
            if !self.files.is_empty() {
                info!("Replaying {} images from {}", self.files.len(), self.dir.display());
            }
        }
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    async fn capture(&mut self, n: u32) -> Result<Vec<CaptureSample>, VisionError> {
        self.refresh();
        if self.files.is_empty() {
            return Err(VisionError::DeviceUnavailable(format!(
                "no images in {}",
                self.dir.display()
            )));
        }

        let mut samples = Vec::with_capacity(n as usize);
        let mut last_error = None;
        for _ in 0..n {
            let path = self.files[self.cursor % self.files.len()].clone();
            self.cursor = (self.cursor + 1) % self.files.len();

            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || image::open(path)
            })
            .await
            .map_err(|e| VisionError::Processing(format!("decoder task failed: {}", e)))?;

            match loaded {
                Ok(image) => {
                    debug!("Loaded frame {}", path.display());
                    samples.push(CaptureSample::new(image));
                }
                Err(e) => {
                    warn!("Skipping unreadable frame {}: {}", path.display(), e);
                    last_error = Some(e.to_string());
                }
            }
        }

        if samples.is_empty() {
            return Err(VisionError::DeviceUnavailable(
                last_error.unwrap_or_else(|| "no frames delivered".to_string()),
            ));
        }
        Ok(samples)
    }

    async fn is_alive(&mut self) -> bool {
        self.refresh();
        !self.files.is_empty()
    }
}

/// Build the frame source selected by `config`
pub fn open_frame_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, VisionError> {
    match &config.source {
        CameraSource::Directory { path } => Ok(Box::new(DirectoryFrameSource::new(path.clone()))),
        #[cfg(feature = "v4l")]
        CameraSource::Device { index } => Ok(Box::new(crate::v4l_camera::V4lCamera::new(
            *index,
            config.resolution,
            config.frame_interval(),
        ))),
        #[cfg(not(feature = "v4l"))]
        CameraSource::Device { index } => Err(VisionError::Config(format!(
            "camera device {} requested but cardsort-eye was built without the v4l feature",
            index
        ))),
    }
}
