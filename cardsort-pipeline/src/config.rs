//! Configuration for the sorting cell

use crate::error::PipelineError;
use cardsort_arm::ArmConfig;
use cardsort_eye::{CameraConfig, RecognitionConfig};
use cardsort_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Batch loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cards per batch when the command line gives no count
    pub batch_size: u32,
    /// Pause at the scan position before capturing
    pub scan_settle_ms: u64,
    pub return_home_between_cards: bool,
    /// Consecutive end effector faults tolerated before the batch halts; 0 disables the limit
    pub max_consecutive_actuator_faults: u32,
    /// Log a statistics line every N cards; 0 disables periodic lines
    pub statistics_interval: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            scan_settle_ms: 500,
            return_home_between_cards: true,
            max_consecutive_actuator_faults: 3,
            statistics_interval: 10,
        }
    }
}

impl PipelineConfig {
    pub fn scan_settle(&self) -> Duration {
        Duration::from_millis(self.scan_settle_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.level.trim().is_empty() {
            return Err("Log level must not be empty".to_string());
        }
        Ok(())
    }
}

/// Complete configuration of the cell, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub arm: ArmConfig,
    pub camera: CameraConfig,
    pub recognition: RecognitionConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl SorterConfig {
    /// Location tried when no configuration file is given
    pub const DEFAULT_PATH: &'static str = "config/settings.yaml";

    /// Load and validate a YAML (`.yaml`/`.yml`) or TOML (`.toml`) file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let mut config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => {
                return Err(PipelineError::Config(format!(
                    "{}: expected a .yaml, .yml or .toml file",
                    path.display()
                )))
            }
        };
        config.apply_env();
        config.validate().map_err(PipelineError::Config)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path`, or the default location if it exists, or the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, PipelineError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(Self::DEFAULT_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }

        debug!("No configuration file found, using defaults");
        let mut config = Self::default();
        config.apply_env();
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(content).map_err(|e| PipelineError::Config(format!("Invalid YAML: {}", e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content).map_err(|e| PipelineError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `CARDSORT_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("CARDSORT_ARM_PORT") {
            self.arm.port = port;
        }

        if let Some(baud) = lookup("CARDSORT_ARM_BAUDRATE") {
            if let Ok(baud) = baud.parse::<u32>() {
                self.arm.baudrate = baud;
            }
        }

        if let Some(path) = lookup("CARDSORT_STORAGE_PATH") {
            self.storage.path = path.into();
        }

        if let Some(level) = lookup("CARDSORT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.arm.validate().map_err(|e| format!("arm: {}", e))?;
        self.camera.validate().map_err(|e| format!("camera: {}", e))?;
        self.recognition
            .validate()
            .map_err(|e| format!("recognition: {}", e))?;
        self.storage.validate().map_err(|e| format!("storage: {}", e))?;
        self.pipeline.validate().map_err(|e| format!("pipeline: {}", e))?;
        self.logging.validate().map_err(|e| format!("logging: {}", e))?;
        Ok(())
    }
}
