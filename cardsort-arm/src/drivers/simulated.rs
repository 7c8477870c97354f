//! Simulated arm for tests and dry runs

use crate::driver::{EffectorCommand, MotionDriver, MotionRequest};
use crate::error::ArmError;
use async_trait::async_trait;
use cardsort_core::{Pose, WaypointName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Command as seen by the simulated hardware
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Open,
    Close,
    /// Leg through a waypoint's approach pose
    Approach(WaypointName, Pose),
    /// Leg onto the waypoint itself
    Move(WaypointName, Pose),
    Effector(EffectorCommand, u32),
}

/// Injected hardware failure.
///
/// `occurrence` is 1-based and counts target legs (or effector commands)
/// of the given kind since the driver was created.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The control channel cannot be opened
    OpenRefused,
    /// Firmware answers the move with an error
    MoveReported { target: WaypointName, occurrence: u32 },
    /// The move never completes
    MoveStall { target: WaypointName, occurrence: u32 },
    /// Effector command fails
    Effector { command: EffectorCommand, occurrence: u32 },
    /// Close succeeds but nothing is held afterwards
    EmptyGrip { occurrence: u32 },
}

/// Shared view of every command the driver received
#[derive(Debug, Clone, Default)]
pub struct SimulationLog {
    commands: Arc<Mutex<Vec<DriverCommand>>>,
}

impl SimulationLog {
    pub fn commands(&self) -> Vec<DriverCommand> {
        self.commands.lock().clone()
    }

    /// Number of target legs sent towards `waypoint`
    pub fn moves_to(&self, waypoint: WaypointName) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, DriverCommand::Move(w, _) if *w == waypoint))
            .count()
    }

    /// Waypoints of all target legs, in order
    pub fn move_sequence(&self) -> Vec<WaypointName> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                DriverCommand::Move(w, _) => Some(*w),
                _ => None,
            })
            .collect()
    }

    fn push(&self, command: DriverCommand) {
        self.commands.lock().push(command);
    }
}

/// Driver that accepts every command immediately unless a fault is injected
pub struct SimulatedDriver {
    open: bool,
    holding: bool,
    faults: Vec<Fault>,
    move_counts: HashMap<WaypointName, u32>,
    effector_counts: HashMap<EffectorCommand, u32>,
    move_delay: Duration,
    log: SimulationLog,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            open: false,
            holding: false,
            faults: Vec::new(),
            move_counts: HashMap::new(),
            effector_counts: HashMap::new(),
            move_delay: Duration::ZERO,
            log: SimulationLog::default(),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.inject(fault);
        self
    }

    /// Pretend each leg takes `delay`
    pub fn with_move_delay(mut self, delay: Duration) -> Self {
        self.move_delay = delay;
        self
    }

    pub fn inject(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn log(&self) -> SimulationLog {
        self.log.clone()
    }

    fn move_fault(&self, target: WaypointName, count: u32) -> Option<&Fault> {
        self.faults.iter().find(|f| match f {
            Fault::MoveReported {
                target: t,
                occurrence,
            }
            | Fault::MoveStall {
                target: t,
                occurrence,
            } => *t == target && *occurrence == count,
            _ => false,
        })
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionDriver for SimulatedDriver {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open(&mut self) -> Result<(), ArmError> {
        self.log.push(DriverCommand::Open);
        if self.faults.contains(&Fault::OpenRefused) {
            return Err(ArmError::Connection(
                "simulated controller refused connection".to_string(),
            ));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ArmError> {
        self.log.push(DriverCommand::Close);
        self.open = false;
        Ok(())
    }

    async fn move_to_pose(&mut self, request: &MotionRequest) -> Result<(), ArmError> {
        if !self.open {
            return Err(ArmError::Connection("driver is not open".to_string()));
        }

        if request.approach {
            self.log
                .push(DriverCommand::Approach(request.waypoint, request.pose));
            if !self.move_delay.is_zero() {
                tokio::time::sleep(self.move_delay).await;
            }
            return Ok(());
        }

        self.log.push(DriverCommand::Move(request.waypoint, request.pose));
        let count = {
            let entry = self.move_counts.entry(request.waypoint).or_insert(0);
            *entry += 1;
            *entry
        };
        debug!("Simulated move #{} to {} at {}", count, request.waypoint, request.pose);

        match self.move_fault(request.waypoint, count) {
            Some(Fault::MoveReported { .. }) => Err(ArmError::MotionFault(format!(
                "controller reported error moving to {}",
                request.waypoint
            ))),
            Some(Fault::MoveStall { .. }) => {
                // Never completes; the controller's timeout cuts it off
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ArmError::MotionFault(format!(
                    "move to {} did not complete",
                    request.waypoint
                )))
            }
            _ => {
                if !self.move_delay.is_zero() {
                    tokio::time::sleep(self.move_delay).await;
                }
                Ok(())
            }
        }
    }

    async fn set_effector(&mut self, command: EffectorCommand, value: u32) -> Result<(), ArmError> {
        if !self.open {
            return Err(ArmError::Connection("driver is not open".to_string()));
        }

        self.log.push(DriverCommand::Effector(command, value));
        let count = {
            let entry = self.effector_counts.entry(command).or_insert(0);
            *entry += 1;
            *entry
        };

        let failed = self.faults.iter().any(|f| {
            matches!(f, Fault::Effector { command: c, occurrence } if *c == command && *occurrence == count)
        });
        if failed {
            return Err(ArmError::ActuatorFault(format!(
                "effector did not respond to {}",
                command
            )));
        }

        match command {
            EffectorCommand::Open => self.holding = false,
            EffectorCommand::Close => {
                let empty = self
                    .faults
                    .iter()
                    .any(|f| matches!(f, Fault::EmptyGrip { occurrence } if *occurrence == count));
                self.holding = !empty;
            }
        }
        Ok(())
    }

    async fn grip_feedback(&mut self) -> Result<Option<bool>, ArmError> {
        Ok(Some(self.holding))
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
