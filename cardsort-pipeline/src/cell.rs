//! Assembles the collaborators of a sorting cell from configuration

use crate::config::SorterConfig;
use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;
use cardsort_arm::{ArmConfig, ArmController, MotionController, SimulatedDriver};
use cardsort_eye::{CameraConfig, RecognitionConfig, RecognitionEngine, ScriptedFrameSource, ScriptedRecognizer};
use cardsort_storage::{JsonlScanStore, ScanStore, StorageConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Readings cycled by the stand-in recognizer of a simulated cell
const SIMULATED_READINGS: [(&str, f64); 4] = [
    ("CARD-10001", 0.93),
    ("CARD-10002", 0.88),
    ("C4RD 1O0?3", 0.41),
    ("CARD-10004", 0.79),
];

/// Arm controller over the simulated or the serial driver
pub fn build_motion(config: &ArmConfig, simulation: bool) -> Result<Box<dyn MotionController>, PipelineError> {
    if simulation {
        info!("Arm running in simulation mode");
        let arm = ArmController::new(config.clone(), SimulatedDriver::new())
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        return Ok(Box::new(arm));
    }

    hardware_motion(config)
}

#[cfg(feature = "serial")]
fn hardware_motion(config: &ArmConfig) -> Result<Box<dyn MotionController>, PipelineError> {
    let driver = cardsort_arm::SerialDriver::from_config(config);
    let arm = ArmController::new(config.clone(), driver).map_err(|e| PipelineError::Config(e.to_string()))?;
    Ok(Box::new(arm))
}

#[cfg(not(feature = "serial"))]
fn hardware_motion(config: &ArmConfig) -> Result<Box<dyn MotionController>, PipelineError> {
    Err(PipelineError::Config(format!(
        "arm on {} requested but cardsort was built without the serial feature; use --simulation",
        config.port
    )))
}

/// Recognition engine over the configured camera and recognizer.
///
/// A simulated cell falls back to scripted vision when the configured camera
/// cannot be opened in this build.
pub fn build_engine(
    camera: &CameraConfig,
    recognition: &RecognitionConfig,
    simulation: bool,
) -> Result<RecognitionEngine, PipelineError> {
    match RecognitionEngine::from_config(camera, recognition) {
        Ok(engine) => Ok(engine),
        Err(e) if simulation => {
            warn!("Using scripted vision, configured camera unavailable: {}", e);
            let engine = RecognitionEngine::new(
                recognition.clone(),
                Box::new(ScriptedFrameSource::new()),
                Box::new(ScriptedRecognizer::new().cycling(SIMULATED_READINGS)),
            )?;
            Ok(engine)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn open_store(config: &StorageConfig) -> Arc<dyn ScanStore> {
    Arc::new(JsonlScanStore::from_config(config))
}

impl Orchestrator {
    /// Cell described by `config`, with a simulated arm when `simulation` is set
    pub fn from_config(config: &SorterConfig, simulation: bool) -> Result<Self, PipelineError> {
        let motion = build_motion(&config.arm, simulation)?;
        let engine = build_engine(&config.camera, &config.recognition, simulation)?;
        let store = open_store(&config.storage);
        Ok(Orchestrator::new(motion, engine, store, config.pipeline.clone()))
    }
}
