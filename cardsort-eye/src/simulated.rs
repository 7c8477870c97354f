//! Scripted vision and recognition providers for tests and dry runs

use crate::camera::{CaptureSample, FrameSource};
use crate::error::VisionError;
use crate::ocr::{TextReading, TextRecognizer};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Stand-in card: dark stripes on a light background
pub fn synthetic_frame(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
        if (x / 4 + y / 8) % 2 == 0 {
            Luma([30])
        } else {
            Luma([220])
        }
    }))
}

/// Frame source that replays a queue of frames and failures.
///
/// Once the queue is drained it keeps delivering the fallback frame, or
/// fails every frame when there is none.
pub struct ScriptedFrameSource {
    script: VecDeque<Option<DynamicImage>>,
    fallback: Option<DynamicImage>,
    requested: Arc<AtomicU32>,
}

impl ScriptedFrameSource {
    /// Delivers a synthetic frame for every request
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Some(synthetic_frame(64, 32)),
            requested: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A camera that never delivers
    pub fn unavailable() -> Self {
        Self {
            fallback: None,
            ..Self::new()
        }
    }

    pub fn push_frame(mut self, image: DynamicImage) -> Self {
        self.script.push_back(Some(image));
        self
    }

    pub fn push_failure(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    /// Shared count of frames requested so far
    pub fn requested(&self) -> Arc<AtomicU32> {
        self.requested.clone()
    }
}

impl Default for ScriptedFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn capture(&mut self, n: u32) -> Result<Vec<CaptureSample>, VisionError> {
        let mut samples = Vec::new();
        for _ in 0..n {
            self.requested.fetch_add(1, Ordering::SeqCst);
            let frame = match self.script.pop_front() {
                Some(scripted) => scripted,
                None => self.fallback.clone(),
            };
            if let Some(image) = frame {
                samples.push(CaptureSample::new(image));
            }
        }

        if samples.is_empty() {
            return Err(VisionError::DeviceUnavailable(
                "scripted camera delivered no frames".to_string(),
            ));
        }
        Ok(samples)
    }

    async fn is_alive(&mut self) -> bool {
        self.fallback.is_some() || self.script.iter().any(|f| f.is_some())
    }
}

/// Recognizer that returns queued readings, then cycles the fallback list
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Result<TextReading, String>>>,
    fallback: Vec<TextReading>,
    cursor: AtomicU32,
    calls: Arc<AtomicU32>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Vec::new(),
            cursor: AtomicU32::new(0),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Queue readings in order
    pub fn with_readings<'a>(readings: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let recognizer = Self::new();
        for (text, confidence) in readings {
            recognizer.push(text, confidence);
        }
        recognizer
    }

    /// Readings repeated once the queue is empty
    pub fn cycling<'a>(mut self, readings: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        self.fallback = readings
            .into_iter()
            .map(|(text, confidence)| TextReading::new(text, confidence))
            .collect();
        self
    }

    pub fn push(&self, text: &str, confidence: f64) {
        self.script
            .lock()
            .push_back(Ok(TextReading::new(text, confidence)));
    }

    pub fn push_failure(&self, message: &str) {
        self.script.lock().push_back(Err(message.to_string()));
    }

    /// Shared count of `infer` calls
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    fn engine(&self) -> &str {
        "scripted"
    }

    async fn infer(&self, _region: &DynamicImage) -> Result<TextReading, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.lock().pop_front() {
            return next.map_err(VisionError::Recognition);
        }
        if self.fallback.is_empty() {
            return Ok(TextReading::empty());
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize % self.fallback.len();
        Ok(self.fallback[i].clone())
    }
}
