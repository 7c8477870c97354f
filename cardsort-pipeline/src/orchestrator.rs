//! Batch orchestration: one card at a time through pick, scan, route and place

use crate::batch::{BatchRun, BatchSummary, CancelFlag, HaltCause, HaltReport, HomeAttempt};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::stage::{route, CardStage};
use cardsort_arm::{ArmError, ArmState, MotionController};
use cardsort_core::{CardOutcome, Pile, RecognitionResult, RecordId, ScanRecord, WaypointName};
use cardsort_eye::RecognitionEngine;
use cardsort_storage::ScanStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a card cycle ended without halting the batch
enum CardFlow {
    Sorted { accepted: bool },
    /// End effector fault, recorded; the arm still needs to be homed
    Faulted { stage: CardStage },
}

/// A card cycle that must halt the batch
struct CardHalt {
    stage: CardStage,
    cause: HaltCause,
}

/// Sequences the arm, the recognition engine and the store.
///
/// Strictly one call at a time: nothing here is spawned, so the arm never
/// receives a command while another is in flight.
pub struct Orchestrator {
    motion: Box<dyn MotionController>,
    engine: RecognitionEngine,
    store: Arc<dyn ScanStore>,
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(
        motion: Box<dyn MotionController>,
        engine: RecognitionEngine,
        store: Arc<dyn ScanStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            motion,
            engine,
            store,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the batch before the next card
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn arm_state(&self) -> &ArmState {
        self.motion.state()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process up to `cards` cards.
    ///
    /// Only a failed `connect()` is returned as an error. Every other fault
    /// ends up in the summary: per-card faults as failed cards, run-fatal
    /// faults as a [`HaltReport`].
    pub async fn run_batch(&mut self, cards: u32) -> Result<BatchSummary, PipelineError> {
        let mut run = BatchRun::new(cards);
        info!(run_id = %run.run_id, cards, "Starting batch");

        self.motion.connect().await.map_err(PipelineError::Startup)?;

        if !self.engine.camera_alive().await {
            warn!(
                "Camera {} is not delivering frames, cards will be routed as unreadable",
                self.engine.describe_source()
            );
        }

        if let Err(err) = self.motion.home().await {
            let report = self
                .halt(&mut run, None, CardStage::Idle, HaltCause::Arm(err), false, false)
                .await;
            return Ok(self.summarize(run, Some(report), false));
        }

        let mut consecutive_faults = 0;
        let mut cancelled = false;
        let mut halt = None;

        for card in 1..=cards {
            if self.cancel.is_cancelled() {
                warn!(card, "Batch cancelled before card");
                cancelled = true;
                break;
            }

            match self.process_card(run.run_id, card).await {
                Ok(CardFlow::Sorted { accepted }) => {
                    if accepted {
                        run.record_success();
                    } else {
                        run.record_failure();
                    }
                    consecutive_faults = 0;

                    if self.config.return_home_between_cards {
                        if let Err(err) = self.motion.home().await {
                            halt = Some(
                                self.halt(&mut run, Some(card), CardStage::Recorded, HaltCause::Arm(err), false, false)
                                    .await,
                            );
                            break;
                        }
                    }
                }
                Ok(CardFlow::Faulted { stage }) => {
                    run.record_failure();
                    consecutive_faults += 1;

                    let limit = self.config.max_consecutive_actuator_faults;
                    if limit > 0 && consecutive_faults >= limit {
                        let cause = HaltCause::ActuatorFaultLimit(consecutive_faults);
                        halt = Some(self.halt(&mut run, Some(card), stage, cause, false, true).await);
                        break;
                    }

                    if let Err(err) = self.motion.home().await {
                        halt = Some(
                            self.halt(&mut run, Some(card), CardStage::Recorded, HaltCause::Arm(err), false, false)
                                .await,
                        );
                        break;
                    }
                }
                Err(card_halt) => {
                    halt = Some(
                        self.halt(&mut run, Some(card), card_halt.stage, card_halt.cause, true, true)
                            .await,
                    );
                    break;
                }
            }

            let interval = self.config.statistics_interval;
            if interval > 0 && run.cards_processed % interval == 0 {
                info!("Statistics: {}", run);
            }
        }

        info!("Batch finished: {}", run);
        Ok(self.summarize(run, halt, cancelled))
    }

    /// Release the arm; errors are logged, the batch result stands
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.motion.disconnect().await {
            warn!("Failed to disconnect arm: {}", e);
        }
    }

    async fn process_card(&mut self, run_id: Uuid, card: u32) -> Result<CardFlow, CardHalt> {
        enter(card, CardStage::Picking);
        if let Err(err) = self.motion.pick_card().await {
            return self.card_fault(run_id, card, CardStage::Picking, err, None).await;
        }

        enter(card, CardStage::MovingToScan);
        if let Err(err) = self.motion.move_to(WaypointName::ScanPosition).await {
            return self.card_fault(run_id, card, CardStage::MovingToScan, err, None).await;
        }

        enter(card, CardStage::Scanning);
        tokio::time::sleep(self.config.scan_settle()).await;
        let result = self.engine.recognize_card().await;

        enter(card, CardStage::Routing);
        let pile = route(&result);

        enter(card, CardStage::Placing);
        if let Err(err) = self.motion.place_card(pile).await {
            return self
                .card_fault(run_id, card, CardStage::Placing, err, Some((&result, pile)))
                .await;
        }

        enter(card, CardStage::Recorded);
        let record = ScanRecord::scanned(run_id, card, &result, pile, CardOutcome::Sorted);
        self.persist(record, CardStage::Recorded).await?;
        info!(
            card,
            code = ?result.normalized_code,
            confidence = result.confidence,
            pile = %pile,
            "Card sorted"
        );
        Ok(CardFlow::Sorted {
            accepted: result.accepted,
        })
    }

    /// Turn a motion failure during a card cycle into a record or a halt
    async fn card_fault(
        &mut self,
        run_id: Uuid,
        card: u32,
        stage: CardStage,
        err: ArmError,
        scanned: Option<(&RecognitionResult, Pile)>,
    ) -> Result<CardFlow, CardHalt> {
        if err.is_run_fatal() {
            if let Some((result, pile)) = scanned {
                let record = ScanRecord::scanned(run_id, card, result, pile, CardOutcome::Aborted)
                    .with_note(err.to_string());
                if let Err(e) = self.store.append(record).await {
                    error!(card, "Failed to record aborted card: {}", e);
                }
            }
            return Err(CardHalt {
                stage,
                cause: HaltCause::Arm(err),
            });
        }

        warn!(card, stage = %stage, "End effector fault, card failed: {}", err);
        let record = match scanned {
            Some((result, pile)) => ScanRecord::scanned(run_id, card, result, pile, CardOutcome::Dropped),
            None => ScanRecord::unscanned(run_id, card, CardOutcome::PickFailed),
        }
        .with_note(err.to_string());
        self.persist(record, stage).await?;
        Ok(CardFlow::Faulted { stage })
    }

    async fn persist(&self, record: ScanRecord, stage: CardStage) -> Result<RecordId, CardHalt> {
        self.store.append(record).await.map_err(|e| CardHalt {
            stage,
            cause: HaltCause::Storage(e.to_string()),
        })
    }

    /// Enter `Halted`: one recovery `home()` unless the fault was a failed home
    async fn halt(
        &mut self,
        run: &mut BatchRun,
        card: Option<u32>,
        stage: CardStage,
        cause: HaltCause,
        in_flight: bool,
        retry_home: bool,
    ) -> HaltReport {
        if in_flight {
            run.record_abort();
        }
        if let Some(card) = card {
            enter(card, CardStage::Halted);
        }
        error!(card = ?card, stage = %stage, "Batch halted: {}", cause);

        let home_attempt = if retry_home {
            match self.motion.home().await {
                Ok(()) => {
                    info!("Recovery home succeeded");
                    HomeAttempt::Succeeded
                }
                Err(err) => {
                    error!("Recovery home failed, operator intervention required: {}", err);
                    HomeAttempt::Failed(err)
                }
            }
        } else {
            HomeAttempt::NotRetried
        };

        HaltReport {
            card,
            stage,
            reason: cause,
            home_attempt,
            arm_state: self.motion.state().clone(),
        }
    }

    fn summarize(&self, run: BatchRun, halt: Option<HaltReport>, cancelled: bool) -> BatchSummary {
        BatchSummary {
            run,
            halt,
            cancelled,
            arm_state: self.motion.state().clone(),
            finished_at: Utc::now(),
        }
    }
}

fn enter(card: u32, stage: CardStage) {
    debug!(card, stage = %stage, "Card stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cardsort_arm::{
        ArmConfig, ArmController, ArmPosition, EffectorCommand, Fault, SimulatedDriver, SimulationLog, Waypoint,
    };
    use cardsort_core::Pose;
    use cardsort_eye::{RecognitionConfig, ScriptedFrameSource, ScriptedRecognizer};
    use cardsort_storage::{MemoryScanStore, ScanQuery, StorageError};
    use std::path::{Path, PathBuf};

    fn fast_arm() -> ArmConfig {
        let mut config = ArmConfig::default();
        config.motion.grip_delay_ms = 1;
        config.motion.release_delay_ms = 1;
        config.motion.move_timeout_ms = 50;
        config.motion.actuator_timeout_ms = 50;
        config
    }

    fn fast_pipeline() -> PipelineConfig {
        PipelineConfig {
            scan_settle_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn engine(recognizer: ScriptedRecognizer) -> RecognitionEngine {
        RecognitionEngine::new(
            RecognitionConfig::default(),
            Box::new(ScriptedFrameSource::new()),
            Box::new(recognizer),
        )
        .unwrap()
    }

    fn readable() -> ScriptedRecognizer {
        ScriptedRecognizer::new().cycling([("CARD-1001", 0.9)])
    }

    struct Cell {
        orchestrator: Orchestrator,
        log: SimulationLog,
        store: Arc<MemoryScanStore>,
    }

    fn cell_with(arm: ArmConfig, driver: SimulatedDriver, recognizer: ScriptedRecognizer, config: PipelineConfig) -> Cell {
        let log = driver.log();
        let store = Arc::new(MemoryScanStore::new());
        let motion = ArmController::new(arm, driver).unwrap();
        let orchestrator = Orchestrator::new(Box::new(motion), engine(recognizer), store.clone(), config);
        Cell {
            orchestrator,
            log,
            store,
        }
    }

    fn cell(driver: SimulatedDriver, recognizer: ScriptedRecognizer) -> Cell {
        cell_with(fast_arm(), driver, recognizer, fast_pipeline())
    }

    #[tokio::test]
    async fn test_batch_routes_by_acceptance() {
        let recognizer = ScriptedRecognizer::with_readings([
            ("CARD-1001", 0.9),
            ("??", 0.1),
            ("??", 0.1),
            ("??", 0.1),
        ])
        .cycling([("CARD-2002", 0.95)]);
        let mut cell = cell(SimulatedDriver::new(), recognizer);

        let summary = cell.orchestrator.run_batch(3).await.unwrap();
        assert!(!summary.is_halted());
        assert!(!summary.cancelled);
        assert_eq!(summary.run.cards_processed, 3);
        assert_eq!(summary.run.cards_succeeded, 2);
        assert_eq!(summary.run.cards_failed, 1);
        assert_eq!(
            summary.run.cards_processed,
            summary.run.cards_succeeded + summary.run.cards_failed
        );

        let records = cell.store.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].destination, Some(Pile::Success));
        assert_eq!(records[1].destination, Some(Pile::Failed));
        assert!(!records[1].accepted);
        assert_eq!(records[2].normalized_code.as_deref(), Some("CARD-2002"));
        assert!(records.iter().all(|r| r.outcome == CardOutcome::Sorted));
        assert!(records.iter().all(|r| r.run_id == summary.run.run_id));

        assert_eq!(cell.log.moves_to(WaypointName::SuccessPile), 2);
        assert_eq!(cell.log.moves_to(WaypointName::FailedPile), 1);
        assert_eq!(summary.arm_state.position, ArmPosition::Known(WaypointName::Home));
    }

    #[tokio::test]
    async fn test_motion_fault_at_scan_halts_batch() {
        let driver = SimulatedDriver::new().with_fault(Fault::MoveReported {
            target: WaypointName::ScanPosition,
            occurrence: 4,
        });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(10).await.unwrap();
        assert_eq!(summary.run.cards_processed, 3);
        assert_eq!(summary.run.cards_succeeded, 3);
        assert_eq!(summary.run.cards_aborted, 1);

        let halt = summary.halt.as_ref().unwrap();
        assert_eq!(halt.card, Some(4));
        assert_eq!(halt.stage, CardStage::MovingToScan);
        match &halt.reason {
            HaltCause::Arm(ArmError::MotionFault(_)) => {}
            other => panic!("Expected motion fault, got {:?}", other),
        }
        assert_eq!(halt.home_attempt, HomeAttempt::Succeeded);

        // Card 4 never reached the camera, cards 5 to 10 never started
        assert_eq!(cell.store.len(), 3);
        assert_eq!(cell.log.moves_to(WaypointName::CardPile), 4);
        // Initial home, three between cards, one recovery attempt
        assert_eq!(cell.log.moves_to(WaypointName::Home), 5);
    }

    #[tokio::test]
    async fn test_failed_recovery_home_leaves_arm_unknown() {
        let driver = SimulatedDriver::new()
            .with_fault(Fault::MoveStall {
                target: WaypointName::ScanPosition,
                occurrence: 1,
            })
            .with_fault(Fault::MoveReported {
                target: WaypointName::Home,
                occurrence: 2,
            });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(5).await.unwrap();
        let halt = summary.halt.as_ref().unwrap();
        assert!(matches!(halt.home_attempt, HomeAttempt::Failed(_)));
        assert!(halt.needs_operator());
        assert_eq!(summary.arm_state.position, ArmPosition::Unknown);
        assert_eq!(cell.log.moves_to(WaypointName::Home), 2);
    }

    #[tokio::test]
    async fn test_halt_while_placing_records_aborted_card() {
        let driver = SimulatedDriver::new().with_fault(Fault::MoveReported {
            target: WaypointName::SuccessPile,
            occurrence: 1,
        });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(4).await.unwrap();
        assert_eq!(summary.run.cards_processed, 0);
        assert_eq!(summary.run.cards_aborted, 1);
        assert_eq!(summary.halt.as_ref().unwrap().stage, CardStage::Placing);

        let records = cell.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, CardOutcome::Aborted);
        assert_eq!(records[0].destination, Some(Pile::Success));
        assert!(records[0].note.as_deref().unwrap_or_default().contains("Motion fault"));
    }

    #[tokio::test]
    async fn test_safety_violation_halts_before_motion() {
        let mut arm = fast_arm();
        arm.waypoints.scan_position = Waypoint::at(Pose::new(0.0, -150.0, -20.0));
        let driver = SimulatedDriver::new();
        let log = driver.log();
        let store = Arc::new(MemoryScanStore::new());
        let motion = ArmController::new(arm, driver).unwrap();
        let mut orchestrator = Orchestrator::new(Box::new(motion), engine(readable()), store.clone(), fast_pipeline());

        let summary = orchestrator.run_batch(3).await.unwrap();
        let halt = summary.halt.as_ref().unwrap();
        match &halt.reason {
            HaltCause::Arm(ArmError::SafetyViolation { waypoint, .. }) => {
                assert_eq!(*waypoint, WaypointName::ScanPosition)
            }
            other => panic!("Expected safety violation, got {:?}", other),
        }
        assert_eq!(log.moves_to(WaypointName::ScanPosition), 0);
        assert_eq!(halt.home_attempt, HomeAttempt::Succeeded);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_actuator_fault_fails_card_and_continues() {
        let driver = SimulatedDriver::new().with_fault(Fault::Effector {
            command: EffectorCommand::Close,
            occurrence: 1,
        });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(3).await.unwrap();
        assert!(!summary.is_halted());
        assert_eq!(summary.run.cards_processed, 3);
        assert_eq!(summary.run.cards_failed, 1);
        assert_eq!(summary.run.cards_succeeded, 2);

        let records = cell.store.records();
        assert_eq!(records[0].outcome, CardOutcome::PickFailed);
        assert_eq!(records[0].destination, None);
        assert_eq!(records[1].outcome, CardOutcome::Sorted);
    }

    #[tokio::test]
    async fn test_drop_while_placing_is_recorded() {
        let driver = SimulatedDriver::new().with_fault(Fault::Effector {
            command: EffectorCommand::Open,
            occurrence: 2,
        });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(2).await.unwrap();
        assert!(!summary.is_halted());
        let records = cell.store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, CardOutcome::Dropped);
        assert_eq!(records[0].destination, Some(Pile::Success));
        assert_eq!(records[0].normalized_code.as_deref(), Some("CARD-1001"));
    }

    #[tokio::test]
    async fn test_consecutive_actuator_faults_escalate() {
        let driver = SimulatedDriver::new()
            .with_fault(Fault::EmptyGrip { occurrence: 1 })
            .with_fault(Fault::EmptyGrip { occurrence: 2 });
        let config = PipelineConfig {
            max_consecutive_actuator_faults: 2,
            ..fast_pipeline()
        };
        let mut cell = cell_with(fast_arm(), driver, readable(), config);

        let summary = cell.orchestrator.run_batch(5).await.unwrap();
        let halt = summary.halt.as_ref().unwrap();
        assert_eq!(halt.reason, HaltCause::ActuatorFaultLimit(2));
        assert_eq!(halt.card, Some(2));
        assert_eq!(summary.run.cards_processed, 2);
        assert_eq!(summary.run.cards_aborted, 0);
        assert_eq!(cell.store.len(), 2);
    }

    #[tokio::test]
    async fn test_unlimited_actuator_faults() {
        let mut driver = SimulatedDriver::new();
        for occurrence in 1..=4 {
            driver.inject(Fault::EmptyGrip { occurrence });
        }
        let config = PipelineConfig {
            max_consecutive_actuator_faults: 0,
            ..fast_pipeline()
        };
        let mut cell = cell_with(fast_arm(), driver, readable(), config);

        let summary = cell.orchestrator.run_batch(5).await.unwrap();
        assert!(!summary.is_halted());
        assert_eq!(summary.run.cards_failed, 4);
        assert_eq!(summary.run.cards_succeeded, 1);
    }

    #[tokio::test]
    async fn test_connection_refused_fails_startup() {
        let mut cell = cell(SimulatedDriver::new().with_fault(Fault::OpenRefused), readable());
        match cell.orchestrator.run_batch(3).await {
            Err(PipelineError::Startup(ArmError::Connection(_))) => {}
            other => panic!("Expected startup failure, got {:?}", other),
        }
        assert!(cell.store.is_empty());
    }

    #[tokio::test]
    async fn test_initial_home_failure_halts() {
        let driver = SimulatedDriver::new().with_fault(Fault::MoveReported {
            target: WaypointName::Home,
            occurrence: 1,
        });
        let mut cell = cell(driver, readable());

        let summary = cell.orchestrator.run_batch(3).await.unwrap();
        let halt = summary.halt.as_ref().unwrap();
        assert_eq!(halt.card, None);
        assert_eq!(halt.home_attempt, HomeAttempt::NotRetried);
        assert_eq!(summary.run.cards_processed, 0);
        assert_eq!(cell.log.moves_to(WaypointName::Home), 1);
        assert_eq!(cell.log.moves_to(WaypointName::CardPile), 0);
    }

    #[tokio::test]
    async fn test_camera_unavailable_routes_to_failed_pile() {
        let store = Arc::new(MemoryScanStore::new());
        let motion = ArmController::new(fast_arm(), SimulatedDriver::new()).unwrap();
        let engine = RecognitionEngine::new(
            RecognitionConfig::default(),
            Box::new(ScriptedFrameSource::unavailable()),
            Box::new(readable()),
        )
        .unwrap();
        let mut orchestrator = Orchestrator::new(Box::new(motion), engine, store.clone(), fast_pipeline());

        let summary = orchestrator.run_batch(2).await.unwrap();
        assert!(!summary.is_halted());
        assert_eq!(summary.run.cards_failed, 2);
        assert!(store
            .records()
            .iter()
            .all(|r| r.normalized_code.is_none() && r.destination == Some(Pile::Failed)));
    }

    #[tokio::test]
    async fn test_no_homing_between_cards() {
        let config = PipelineConfig {
            return_home_between_cards: false,
            ..fast_pipeline()
        };
        let mut cell = cell_with(fast_arm(), SimulatedDriver::new(), readable(), config);

        let summary = cell.orchestrator.run_batch(3).await.unwrap();
        assert_eq!(summary.run.cards_succeeded, 3);
        assert_eq!(cell.log.moves_to(WaypointName::Home), 1);
    }

    /// Store that raises the cancel flag once a record lands
    struct CancellingStore {
        inner: MemoryScanStore,
        cancel: CancelFlag,
    }

    #[async_trait]
    impl ScanStore for CancellingStore {
        async fn append(&self, record: ScanRecord) -> Result<RecordId, StorageError> {
            let id = self.inner.append(record).await?;
            self.cancel.cancel();
            Ok(id)
        }

        async fn query(&self, query: &ScanQuery) -> Result<Vec<ScanRecord>, StorageError> {
            self.inner.query(query).await
        }

        async fn backup(&self, destination: Option<&Path>) -> Result<PathBuf, StorageError> {
            self.inner.backup(destination).await
        }
    }

    #[tokio::test]
    async fn test_cancel_takes_effect_between_cards() {
        let cancel = CancelFlag::new();
        let store = Arc::new(CancellingStore {
            inner: MemoryScanStore::new(),
            cancel: cancel.clone(),
        });
        let motion = ArmController::new(fast_arm(), SimulatedDriver::new()).unwrap();
        let mut orchestrator =
            Orchestrator::new(Box::new(motion), engine(readable()), store.clone(), fast_pipeline())
                .with_cancel_flag(cancel);

        let summary = orchestrator.run_batch(5).await.unwrap();
        assert!(summary.cancelled);
        assert!(!summary.is_halted());
        assert_eq!(summary.run.cards_processed, 1);
        assert_eq!(store.inner.len(), 1);
        // The cycle in flight completed, including its homing
        assert_eq!(summary.arm_state.position, ArmPosition::Known(WaypointName::Home));
    }

    struct FailingStore;

    #[async_trait]
    impl ScanStore for FailingStore {
        async fn append(&self, _record: ScanRecord) -> Result<RecordId, StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        async fn query(&self, _query: &ScanQuery) -> Result<Vec<ScanRecord>, StorageError> {
            Ok(Vec::new())
        }

        async fn backup(&self, _destination: Option<&Path>) -> Result<PathBuf, StorageError> {
            Err(StorageError::Unsupported("backup".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_halts() {
        let motion = ArmController::new(fast_arm(), SimulatedDriver::new()).unwrap();
        let mut orchestrator =
            Orchestrator::new(Box::new(motion), engine(readable()), Arc::new(FailingStore), fast_pipeline());

        let summary = orchestrator.run_batch(3).await.unwrap();
        let halt = summary.halt.as_ref().unwrap();
        assert_eq!(halt.stage, CardStage::Recorded);
        assert!(matches!(halt.reason, HaltCause::Storage(_)));
        assert_eq!(summary.run.cards_processed, 0);
        assert_eq!(summary.run.cards_aborted, 1);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let mut cell = cell(SimulatedDriver::new(), readable());
        cell.orchestrator.run_batch(1).await.unwrap();
        cell.orchestrator.shutdown().await;
        assert!(!cell.orchestrator.arm_state().is_connected());
    }
}
