//! Multi-frame, multi-attempt card recognition

use crate::archive::ImageArchive;
use crate::camera::{open_frame_source, CaptureSample, FrameSource};
use crate::config::{CameraConfig, RecognitionConfig};
use crate::error::VisionError;
use crate::format::CodeFormat;
use crate::ocr::{open_recognizer, TextReading, TextRecognizer};
use crate::processing::{extract_roi, preprocess};
use cardsort_core::RecognitionResult;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the frame source and recognizer into one decision per card
pub struct RecognitionEngine {
    config: RecognitionConfig,
    format: CodeFormat,
    source: Box<dyn FrameSource>,
    recognizer: Box<dyn TextRecognizer>,
    archive: Option<ImageArchive>,
    capture_timeout: Duration,
}

impl RecognitionEngine {
    pub fn new(
        config: RecognitionConfig,
        source: Box<dyn FrameSource>,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Config)?;
        let format = CodeFormat::new(&config.code_pattern)?;
        Ok(Self {
            config,
            format,
            source,
            recognizer,
            archive: None,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        })
    }

    /// Engine over the camera and recognizer named in the configuration
    pub fn from_config(camera: &CameraConfig, recognition: &RecognitionConfig) -> Result<Self, VisionError> {
        camera.validate().map_err(VisionError::Config)?;
        let source = open_frame_source(camera)?;
        let recognizer = open_recognizer(recognition)?;
        let mut engine = Self::new(recognition.clone(), source, recognizer)?
            .with_capture_timeout(camera.capture_timeout());
        if camera.save_images {
            engine = engine.with_archive(ImageArchive::new(camera.image_dir.clone()));
        }
        Ok(engine)
    }

    pub fn with_archive(mut self, archive: ImageArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_capture_timeout(mut self, limit: Duration) -> Self {
        self.capture_timeout = limit;
        self
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    pub async fn camera_alive(&mut self) -> bool {
        self.source.is_alive().await
    }

    /// Normalize a reading and decide whether it is accepted.
    ///
    /// Accepted requires both the confidence threshold and the code format;
    /// confidence never overrides a format mismatch.
    pub fn evaluate(&self, reading: &TextReading) -> (Option<String>, bool) {
        let code = CodeFormat::normalize(&reading.text);
        let accepted = reading.confidence >= self.config.confidence_threshold
            && code.as_deref().map(|c| self.format.matches(c)).unwrap_or(false);
        (code, accepted)
    }

    /// Recognize the card under the camera with the configured budgets
    pub async fn recognize_card(&mut self) -> RecognitionResult {
        let (captures, attempts) = (self.config.capture_budget, self.config.attempt_budget);
        self.acquire_and_recognize(captures, attempts).await
    }

    /// Up to `attempt_budget` attempts of `capture_budget` fresh frames each.
    ///
    /// Stops at the first accepted reading. The result is the
    /// highest-confidence reading seen (earliest on a tie), and its
    /// `accepted` flag is that reading's own. Never fails: when no reading
    /// was obtained the result is empty and not accepted.
    pub async fn acquire_and_recognize(&mut self, capture_budget: u32, attempt_budget: u32) -> RecognitionResult {
        let capture_budget = capture_budget.max(1);
        let attempt_budget = attempt_budget.max(1);
        let mut best: Option<RecognitionResult> = None;
        let mut attempts = 0;

        for attempt in 1..=attempt_budget {
            attempts = attempt;
            match self.attempt(capture_budget).await {
                Ok(candidate) => {
                    debug!(
                        attempt,
                        text = %candidate.raw_text,
                        confidence = candidate.confidence,
                        accepted = candidate.accepted,
                        "Recognition attempt"
                    );
                    let accepted = candidate.accepted;
                    let replace = best
                        .as_ref()
                        .map(|b| candidate.confidence > b.confidence)
                        .unwrap_or(true);
                    if replace {
                        best = Some(candidate);
                    }
                    if accepted {
                        break;
                    }
                }
                Err(e) => warn!(attempt, "Recognition attempt failed: {}", e),
            }
        }

        let mut result = best.unwrap_or_else(|| RecognitionResult::empty(self.recognizer.engine(), attempts));
        result.attempt_count = attempts;
        info!(
            code = ?result.normalized_code,
            confidence = result.confidence,
            accepted = result.accepted,
            attempts,
            "Card recognized"
        );
        result
    }

    async fn attempt(&mut self, capture_budget: u32) -> Result<RecognitionResult, VisionError> {
        let samples = match timeout(self.capture_timeout, self.source.capture(capture_budget)).await {
            Ok(samples) => samples?,
            Err(_) => {
                return Err(VisionError::DeviceUnavailable(format!(
                    "capture of {} frames timed out after {:?}",
                    capture_budget, self.capture_timeout
                )))
            }
        };
        let sample = CaptureSample::sharpest(samples)
            .ok_or_else(|| VisionError::DeviceUnavailable("no frames delivered".to_string()))?;
        debug!(quality = sample.quality, "Selected sharpest frame");

        let mut image_reference = None;
        if let Some(archive) = &self.archive {
            match archive.save_original(&sample.image).await {
                Ok(path) => image_reference = Some(path),
                Err(e) => warn!("Could not archive frame: {}", e),
            }
        }

        let region = extract_roi(&sample.image, &self.config.roi)?;
        let processed = preprocess(&region, &self.config.preprocessing);

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.save_processed(&processed).await {
                warn!("Could not archive processed region: {}", e);
            }
        }

        let reading = match timeout(self.config.inference_timeout(), self.recognizer.infer(&processed)).await {
            Ok(reading) => reading?,
            Err(_) => {
                return Err(VisionError::Recognition(format!(
                    "{} timed out after {} ms",
                    self.recognizer.engine(),
                    self.config.inference_timeout_ms
                )))
            }
        };

        let (normalized_code, accepted) = self.evaluate(&reading);
        Ok(RecognitionResult {
            raw_text: reading.text,
            normalized_code,
            confidence: reading.confidence,
            engine: self.recognizer.engine().to_string(),
            attempt_count: 1,
            accepted,
            image_reference,
        })
    }
}
