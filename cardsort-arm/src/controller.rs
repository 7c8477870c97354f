//! Motion controller: the single writer of arm state

use crate::config::ArmConfig;
use crate::driver::{EffectorCommand, MotionDriver, MotionRequest};
use crate::error::ArmError;
use crate::safety::SafetyValidator;
use crate::state::{ArmPosition, ArmState, ConnectionStatus, EffectorState};
use async_trait::async_trait;
use cardsort_core::{Pile, Pose, WaypointName};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Operations the pipeline drives the arm through.
///
/// Every operation either completes and leaves the arm on a named waypoint,
/// or fails and leaves it on a waypoint that is still valid (actuator faults)
/// or in `Unknown` (motion faults). From `Unknown` only `home()` is accepted.
#[async_trait]
pub trait MotionController: Send {
    fn state(&self) -> &ArmState;

    /// Open the control channel; no-op when already connected
    async fn connect(&mut self) -> Result<(), ArmError>;

    async fn disconnect(&mut self) -> Result<(), ArmError>;

    /// Move to HOME from any position, known or not
    async fn home(&mut self) -> Result<(), ArmError>;

    async fn move_to(&mut self, waypoint: WaypointName) -> Result<(), ArmError>;

    /// Drive the effector and wait for its settle delay
    async fn actuate_end_effector(&mut self, command: EffectorCommand) -> Result<(), ArmError>;

    /// Take the top card from the supply pile
    async fn pick_card(&mut self) -> Result<(), ArmError>;

    /// Release the held card onto `pile`
    async fn place_card(&mut self, pile: Pile) -> Result<(), ArmError>;
}

/// Motion controller over any [`MotionDriver`]
pub struct ArmController<D: MotionDriver> {
    config: ArmConfig,
    driver: D,
    safety: SafetyValidator,
    state: ArmState,
}

impl<D: MotionDriver> ArmController<D> {
    pub fn new(config: ArmConfig, driver: D) -> Result<Self, ArmError> {
        config.validate().map_err(ArmError::Config)?;
        let safety = SafetyValidator::new(config.envelope);
        Ok(Self {
            config,
            driver,
            safety,
            state: ArmState::default(),
        })
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Remember `err` as the last error and hand it back
    fn record(&mut self, err: ArmError) -> ArmError {
        warn!("Arm {}: {}", err.kind(), err.detail());
        self.state.last_error = Some(err.to_string());
        err
    }

    fn ensure_ready(&mut self, operation: &str) -> Result<(), ArmError> {
        if !self.state.is_connected() {
            let err = ArmError::InvalidTransition(format!("{} while disconnected", operation));
            return Err(self.record(err));
        }
        if self.state.busy {
            let err = ArmError::InvalidTransition(format!(
                "{} while another command is in flight",
                operation
            ));
            return Err(self.record(err));
        }
        Ok(())
    }

    fn ensure_known(&mut self, operation: &str) -> Result<(), ArmError> {
        if self.state.position == ArmPosition::Unknown {
            let err = ArmError::InvalidTransition(format!(
                "{} from an unknown position; home() first",
                operation
            ));
            return Err(self.record(err));
        }
        Ok(())
    }

    /// Send one leg to the driver under the move timeout
    async fn dispatch(&mut self, waypoint: WaypointName, pose: Pose, approach: bool) -> Result<(), ArmError> {
        let limit = self.config.motion.move_timeout();
        let request = MotionRequest {
            waypoint,
            pose,
            speed: self.config.motion.speed,
            acceleration: self.config.motion.acceleration,
            approach,
        };
        debug!(waypoint = %waypoint, approach, "Dispatching move to {}", pose);

        match timeout(limit, self.driver.move_to_pose(&request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ArmError::MotionFault(e.detail())),
            Err(_) => Err(ArmError::MotionFault(format!(
                "move to {} timed out after {} ms",
                waypoint, self.config.motion.move_timeout_ms
            ))),
        }
    }

    /// Bounds-check then travel approach -> pose.
    ///
    /// The position is `Unknown` from the first dispatched leg until the last
    /// one completes, and stays `Unknown` if any leg fails.
    async fn travel(&mut self, name: WaypointName) -> Result<(), ArmError> {
        let waypoint = self.config.waypoints.get(name).clone();
        if let Err(e) = self.safety.validate_waypoint(name, &waypoint) {
            return Err(self.record(e));
        }

        self.state.busy = true;
        self.state.position = ArmPosition::Unknown;

        let mut legs = Vec::with_capacity(2);
        if let Some(approach) = waypoint.approach {
            legs.push((approach, true));
        }
        legs.push((waypoint.pose, false));

        for (pose, approach) in legs {
            if let Err(e) = self.dispatch(name, pose, approach).await {
                self.state.busy = false;
                return Err(self.record(e));
            }
        }

        self.state.busy = false;
        self.state.position = ArmPosition::Known(name);
        debug!(waypoint = %name, "Arrived");
        Ok(())
    }

    /// Lift back to the waypoint's approach pose, if it has one
    async fn retract(&mut self, name: WaypointName) -> Result<(), ArmError> {
        let Some(approach) = self.config.waypoints.get(name).approach else {
            return Ok(());
        };

        self.state.busy = true;
        self.state.position = ArmPosition::Unknown;
        let result = self.dispatch(name, approach, true).await;
        self.state.busy = false;

        match result {
            Ok(()) => {
                self.state.position = ArmPosition::Known(name);
                Ok(())
            }
            Err(e) => Err(self.record(e)),
        }
    }

    /// Best-effort grip check; a driver without a sensor is trusted
    async fn verify_grip(&mut self, expect_holding: bool) -> Result<(), ArmError> {
        if !self.config.motion.verify_grip {
            return Ok(());
        }

        let limit = self.config.motion.actuator_timeout();
        let err = match timeout(limit, self.driver.grip_feedback()).await {
            Ok(Ok(Some(holding))) if holding == expect_holding => return Ok(()),
            Ok(Ok(Some(_))) if expect_holding => {
                ArmError::ActuatorFault("no card in the effector after pick".to_string())
            }
            Ok(Ok(Some(_))) => {
                ArmError::ActuatorFault("card still held after release".to_string())
            }
            Ok(Ok(None)) => {
                debug!("No grip sensor, assuming success");
                return Ok(());
            }
            Ok(Err(e)) => ArmError::ActuatorFault(e.detail()),
            Err(_) => ArmError::ActuatorFault(format!(
                "grip sensor timed out after {} ms",
                self.config.motion.actuator_timeout_ms
            )),
        };
        Err(self.record(err))
    }
}

#[async_trait]
impl<D: MotionDriver> MotionController for ArmController<D> {
    fn state(&self) -> &ArmState {
        &self.state
    }

    async fn connect(&mut self) -> Result<(), ArmError> {
        if self.state.is_connected() {
            debug!("Arm already connected");
            return Ok(());
        }

        let limit = self.config.motion.connect_timeout();
        let err = match timeout(limit, self.driver.open()).await {
            Ok(Ok(())) => {
                self.state.connection = ConnectionStatus::Connected;
                self.state.last_error = None;
                info!("Connected to arm through {} driver", self.driver.name());
                return Ok(());
            }
            Ok(Err(e)) => ArmError::Connection(e.detail()),
            Err(_) => ArmError::Connection(format!(
                "opening {} timed out after {} ms",
                self.config.port, self.config.motion.connect_timeout_ms
            )),
        };
        Err(self.record(err))
    }

    async fn disconnect(&mut self) -> Result<(), ArmError> {
        if !self.state.is_connected() {
            return Ok(());
        }

        let limit = self.config.motion.connect_timeout();
        let result = match timeout(limit, self.driver.close()).await {
            Ok(result) => result,
            Err(_) => Err(ArmError::Connection("closing the driver timed out".to_string())),
        };

        self.state.connection = ConnectionStatus::Disconnected;
        self.state.position = ArmPosition::Unknown;
        self.state.busy = false;
        info!("Disconnected from arm");
        result.map_err(|e| self.record(e))
    }

    async fn home(&mut self) -> Result<(), ArmError> {
        self.ensure_ready("home")?;
        info!("Homing arm");
        self.travel(WaypointName::Home).await
    }

    async fn move_to(&mut self, waypoint: WaypointName) -> Result<(), ArmError> {
        self.ensure_ready("move")?;
        self.ensure_known(&format!("move to {}", waypoint))?;
        self.travel(waypoint).await
    }

    async fn actuate_end_effector(&mut self, command: EffectorCommand) -> Result<(), ArmError> {
        self.ensure_ready("actuate")?;
        self.ensure_known(&format!("{} effector", command))?;

        let motion = &self.config.motion;
        let (value, settle, target) = match command {
            EffectorCommand::Open => (
                motion.gripper_open_value,
                motion.release_delay(),
                EffectorState::Open,
            ),
            EffectorCommand::Close => (
                motion.gripper_close_value,
                motion.grip_delay(),
                EffectorState::Closed,
            ),
        };
        let limit = motion.actuator_timeout();

        self.state.busy = true;
        let outcome = timeout(limit, self.driver.set_effector(command, value)).await;
        self.state.busy = false;

        let err = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(ArmError::ActuatorFault(e.detail())),
            Err(_) => Some(ArmError::ActuatorFault(format!(
                "{} effector timed out after {} ms",
                command, self.config.motion.actuator_timeout_ms
            ))),
        };
        if let Some(err) = err {
            return Err(self.record(err));
        }

        // Physical settling before anything else moves
        tokio::time::sleep(settle).await;
        self.state.effector = target;
        debug!(command = %command, value, "Effector settled");
        Ok(())
    }

    async fn pick_card(&mut self) -> Result<(), ArmError> {
        self.actuate_end_effector(EffectorCommand::Open).await?;
        self.move_to(WaypointName::CardPile).await?;
        self.actuate_end_effector(EffectorCommand::Close).await?;
        self.verify_grip(true).await?;
        self.retract(WaypointName::CardPile).await
    }

    async fn place_card(&mut self, pile: Pile) -> Result<(), ArmError> {
        let target = pile.waypoint();
        self.move_to(target).await?;
        self.actuate_end_effector(EffectorCommand::Open).await?;
        self.verify_grip(false).await?;
        self.retract(target).await
    }
}
