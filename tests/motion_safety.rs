mod common;

use cardsort_arm::{
    ArmController, ArmError, ArmPosition, DriverCommand, Fault, MotionController, SafetyValidator,
    SimulatedDriver, Waypoint,
};
use cardsort_core::{Pile, Pose, WaypointName};
use cardsort_pipeline::SorterConfig;
use common::fast_arm;
use std::path::Path;
use std::time::{Duration, Instant};

async fn homed(arm: &mut ArmController<SimulatedDriver>) {
    arm.connect().await.unwrap();
    arm.home().await.unwrap();
}

#[tokio::test]
async fn test_every_drifted_waypoint_is_rejected() {
    for target in [
        WaypointName::CardPile,
        WaypointName::ScanPosition,
        WaypointName::SuccessPile,
        WaypointName::FailedPile,
    ] {
        let mut config = fast_arm();
        config.waypoints.get_mut(target).pose.x = 420.0;
        let driver = SimulatedDriver::new();
        let log = driver.log();
        let mut arm = ArmController::new(config, driver).unwrap();
        homed(&mut arm).await;

        match arm.move_to(target).await {
            Err(ArmError::SafetyViolation { waypoint, reason }) => {
                assert_eq!(waypoint, target);
                assert!(reason.contains("x=420"));
            }
            other => panic!("Expected safety violation for {}, got {:?}", target, other),
        }
        assert_eq!(log.moves_to(target), 0);
        assert_eq!(arm.state().position, ArmPosition::Known(WaypointName::Home));
    }
}

#[tokio::test]
async fn test_drifted_home_is_rejected() {
    let mut config = fast_arm();
    config.waypoints.home.pose.z = 350.0;
    let mut arm = ArmController::new(config, SimulatedDriver::new()).unwrap();
    arm.connect().await.unwrap();

    match arm.home().await {
        Err(ArmError::SafetyViolation { waypoint, .. }) => assert_eq!(waypoint, WaypointName::Home),
        other => panic!("Expected safety violation, got {:?}", other),
    }
    assert_eq!(arm.state().position, ArmPosition::Unknown);
}

#[tokio::test]
async fn test_drifted_approach_pose_is_rejected_before_any_leg() {
    let mut config = fast_arm();
    config.waypoints.scan_position =
        Waypoint::at(Pose::new(0.0, -150.0, 80.0)).with_approach(Pose::new(0.0, -150.0, 320.0));
    let driver = SimulatedDriver::new();
    let log = driver.log();
    let mut arm = ArmController::new(config, driver).unwrap();
    homed(&mut arm).await;

    match arm.move_to(WaypointName::ScanPosition).await {
        Err(ArmError::SafetyViolation { reason, .. }) => assert!(reason.starts_with("approach")),
        other => panic!("Expected safety violation, got {:?}", other),
    }
    assert!(!log
        .commands()
        .iter()
        .any(|c| matches!(c, DriverCommand::Approach(WaypointName::ScanPosition, _))));
}

#[tokio::test]
async fn test_motion_fault_blocks_motion_until_home() {
    let driver = SimulatedDriver::new().with_fault(Fault::MoveReported {
        target: WaypointName::ScanPosition,
        occurrence: 1,
    });
    let mut arm = ArmController::new(fast_arm(), driver).unwrap();
    homed(&mut arm).await;
    arm.pick_card().await.unwrap();

    assert!(matches!(
        arm.move_to(WaypointName::ScanPosition).await,
        Err(ArmError::MotionFault(_))
    ));
    assert_eq!(arm.state().position, ArmPosition::Unknown);
    assert!(arm.state().last_error.is_some());

    for target in [WaypointName::ScanPosition, WaypointName::FailedPile] {
        assert!(matches!(
            arm.move_to(target).await,
            Err(ArmError::InvalidTransition(_))
        ));
    }
    assert!(matches!(
        arm.place_card(Pile::Failed).await,
        Err(ArmError::InvalidTransition(_))
    ));

    arm.home().await.unwrap();
    arm.move_to(WaypointName::ScanPosition).await.unwrap();
    assert_eq!(
        arm.state().position,
        ArmPosition::Known(WaypointName::ScanPosition)
    );
}

#[tokio::test]
async fn test_stalled_move_is_cut_off_by_timeout() {
    let driver = SimulatedDriver::new().with_fault(Fault::MoveStall {
        target: WaypointName::CardPile,
        occurrence: 1,
    });
    let mut arm = ArmController::new(fast_arm(), driver).unwrap();
    homed(&mut arm).await;

    let started = Instant::now();
    let result = arm.move_to(WaypointName::CardPile).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    match result {
        Err(ArmError::MotionFault(msg)) => assert!(msg.contains("card_pile")),
        other => panic!("Expected motion fault, got {:?}", other),
    }
    assert_eq!(arm.state().position, ArmPosition::Unknown);
    assert!(!arm.state().busy);
}

#[tokio::test]
async fn test_connect_twice_leaves_state_unchanged() {
    let mut arm = ArmController::new(fast_arm(), SimulatedDriver::new()).unwrap();
    homed(&mut arm).await;
    let before = arm.state().clone();

    arm.connect().await.unwrap();
    assert_eq!(arm.state(), &before);
    assert!(arm.state().is_connected());
    assert_eq!(arm.state().waypoint(), Some(WaypointName::Home));
}

#[tokio::test]
async fn test_actuator_fault_keeps_position_known() {
    let driver = SimulatedDriver::new().with_fault(Fault::EmptyGrip { occurrence: 1 });
    let mut arm = ArmController::new(fast_arm(), driver).unwrap();
    homed(&mut arm).await;

    match arm.pick_card().await {
        Err(err @ ArmError::ActuatorFault(_)) => assert!(!err.is_run_fatal()),
        other => panic!("Expected actuator fault, got {:?}", other),
    }
    assert!(arm.state().is_known());
    arm.home().await.unwrap();
    arm.pick_card().await.unwrap();
}

#[test]
fn test_shipped_settings_stay_inside_envelope() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/settings.yaml");
    let config = SorterConfig::load(&path).unwrap();
    let safety = SafetyValidator::new(config.arm.envelope);
    for name in WaypointName::ALL {
        assert!(safety.validate_waypoint(name, config.arm.waypoints.get(name)).is_ok());
    }
}
