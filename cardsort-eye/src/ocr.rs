//! Text recognition providers

use crate::config::RecognitionConfig;
use crate::error::VisionError;
use async_trait::async_trait;
use image::DynamicImage;
use tokio::process::Command;
use tracing::debug;

/// Text and confidence read from one image region
#[derive(Debug, Clone, PartialEq)]
pub struct TextReading {
    pub text: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl TextReading {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// Recognition provider; stateless per call
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Engine name recorded with each result
    fn engine(&self) -> &str;

    async fn infer(&self, region: &DynamicImage) -> Result<TextReading, VisionError>;
}

/// Runs the `tesseract` binary on a temporary PNG
pub struct TesseractRecognizer {
    command: String,
    languages: String,
    psm: u32,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>, languages: &[String], psm: u32) -> Self {
        Self {
            command: command.into(),
            languages: languages.join("+"),
            psm,
        }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::new(
            config.tesseract_command.clone(),
            &config.languages,
            config.page_segmentation_mode,
        )
    }
}

/// Parse tesseract TSV output.
///
/// Word rows (level 5) with `conf >= 0` and non-blank text are joined with a
/// space; the confidence is the best word confidence scaled to `[0, 1]`.
pub fn parse_tsv(tsv: &str) -> TextReading {
    let mut words = Vec::new();
    let mut best: Option<f64> = None;

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let Ok(conf) = cols[10].trim().parse::<f64>() else {
            continue;
        };
        if conf < 0.0 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        words.push(text);
        best = Some(best.map_or(conf, |b: f64| b.max(conf)));
    }

    match best {
        Some(conf) => TextReading::new(words.join(" "), conf / 100.0),
        None => TextReading::empty(),
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn engine(&self) -> &str {
        "tesseract"
    }

    async fn infer(&self, region: &DynamicImage) -> Result<TextReading, VisionError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("region.png");
        let encoded = region.clone();
        let path = input.clone();
        tokio::task::spawn_blocking(move || encoded.save(path))
            .await
            .map_err(|e| VisionError::Processing(format!("encoder task failed: {}", e)))??;

        let output = Command::new(&self.command)
            .arg(&input)
            .arg("stdout")
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("-l")
            .arg(&self.languages)
            .arg("tsv")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VisionError::Recognition(format!("cannot run {}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(VisionError::Recognition(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let reading = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(text = %reading.text, confidence = reading.confidence, "Tesseract reading");
        Ok(reading)
    }
}

/// Build the recognizer selected by `config.engine`
pub fn open_recognizer(config: &RecognitionConfig) -> Result<Box<dyn TextRecognizer>, VisionError> {
    match config.engine.as_str() {
        "tesseract" => Ok(Box::new(TesseractRecognizer::from_config(config))),
        other => Err(VisionError::Config(format!(
            "unknown recognition engine '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t120\t-1\t
4\t1\t1\t1\t1\t0\t12\t30\t400\t60\t-1\t
5\t1\t1\t1\t1\t1\t12\t30\t180\t60\t91.5\tabc
5\t1\t1\t1\t1\t2\t200\t30\t200\t60\t76.25\t-123
5\t1\t1\t1\t1\t3\t410\t30\t10\t60\t-1\t
";

    #[test]
    fn test_parse_tsv_joins_words() {
        let reading = parse_tsv(TSV);
        assert_eq!(reading.text, "abc -123");
        assert!((reading.confidence - 0.915).abs() < 1e-9);
    }

    #[test]
    fn test_parse_tsv_empty() {
        let header_only = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n";
        assert_eq!(parse_tsv(header_only), TextReading::empty());
    }

    #[test]
    fn test_reading_confidence_clamped() {
        assert_eq!(TextReading::new("X", 1.7).confidence, 1.0);
        assert_eq!(TextReading::new("X", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_open_recognizer_unknown_engine() {
        let mut config = RecognitionConfig::default();
        config.engine = "easyocr".to_string();
        assert!(matches!(open_recognizer(&config), Err(VisionError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_recognition_error() {
        let recognizer = TesseractRecognizer::new(
            "/nonexistent/cardsort-tesseract",
            &["eng".to_string()],
            7,
        );
        let region = DynamicImage::new_luma8(8, 8);
        match recognizer.infer(&region).await {
            Err(VisionError::Recognition(_)) => {}
            other => panic!("Expected recognition error, got {:?}", other),
        }
    }
}
