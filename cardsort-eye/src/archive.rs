//! Traceability copies of recognized frames

use crate::error::VisionError;
use chrono::Utc;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Writes the frames each reading came from into one directory
#[derive(Debug, Clone)]
pub struct ImageArchive {
    dir: PathBuf,
}

impl ImageArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save the full frame as `original_<ts>.jpg`
    pub async fn save_original(&self, image: &DynamicImage) -> Result<PathBuf, VisionError> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        self.save("original", "jpg", rgb).await
    }

    /// Save the preprocessed ROI as `processed_<ts>.png`
    pub async fn save_processed(&self, image: &DynamicImage) -> Result<PathBuf, VisionError> {
        self.save("processed", "png", image.clone()).await
    }

    async fn save(&self, prefix: &str, ext: &str, image: DynamicImage) -> Result<PathBuf, VisionError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let path = self.dir.join(format!("{}_{}.{}", prefix, stamp, ext));
        let dir = self.dir.clone();
        let target = path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), VisionError> {
            std::fs::create_dir_all(&dir)?;
            image.save(&target)?;
            Ok(())
        })
        .await
        .map_err(|e| VisionError::Processing(format!("archive task failed: {}", e)))??;

        Ok(path)
    }
}
