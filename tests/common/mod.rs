//! Shared fixtures for the cross-crate scenarios
#![allow(dead_code)]

use cardsort_arm::{ArmConfig, ArmController, SimulatedDriver, SimulationLog};
use cardsort_eye::{RecognitionConfig, RecognitionEngine, ScriptedFrameSource, ScriptedRecognizer};
use cardsort_pipeline::{Orchestrator, PipelineConfig};
use cardsort_storage::ScanStore;
use std::sync::Arc;

/// Arm settings with millisecond delays and timeouts
pub fn fast_arm() -> ArmConfig {
    let mut config = ArmConfig::default();
    config.motion.grip_delay_ms = 1;
    config.motion.release_delay_ms = 1;
    config.motion.move_timeout_ms = 50;
    config.motion.actuator_timeout_ms = 50;
    config.motion.connect_timeout_ms = 50;
    config
}

pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        scan_settle_ms: 0,
        ..PipelineConfig::default()
    }
}

/// Threshold 0.6 and `^[A-Z]{2,4}-\d{3,5}$`
pub fn scenario_recognition() -> RecognitionConfig {
    RecognitionConfig {
        confidence_threshold: 0.6,
        code_pattern: r"^[A-Z]{2,4}-\d{3,5}$".to_string(),
        inference_timeout_ms: 200,
        ..RecognitionConfig::default()
    }
}

pub fn scripted_engine(source: ScriptedFrameSource, recognizer: ScriptedRecognizer) -> RecognitionEngine {
    RecognitionEngine::new(scenario_recognition(), Box::new(source), Box::new(recognizer))
        .expect("scenario recognition config is valid")
}

/// Recognizer that reads the same valid code forever
pub fn always_readable() -> ScriptedRecognizer {
    ScriptedRecognizer::new().cycling([("ABC-12345", 0.82)])
}

/// Orchestrator over a simulated arm, scripted vision and `store`
pub fn simulated_cell(
    driver: SimulatedDriver,
    recognizer: ScriptedRecognizer,
    store: Arc<dyn ScanStore>,
) -> (Orchestrator, SimulationLog) {
    let log = driver.log();
    let arm = ArmController::new(fast_arm(), driver).expect("fast arm config is valid");
    let engine = scripted_engine(ScriptedFrameSource::new(), recognizer);
    (
        Orchestrator::new(Box::new(arm), engine, store, fast_pipeline()),
        log,
    )
}
