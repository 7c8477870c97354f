//! cardsort-arm: motion controller for the card handling arm
//!
//! Provides:
//! - Single-writer arm state (named position, connection, end effector)
//! - Moves between pre-calibrated waypoints with mandatory per-move timeouts
//! - Workspace envelope validation of every target, regardless of configuration
//! - Gripper/suction actuation with settle delays
//! - Pluggable motion drivers (simulated, serial G-code)

pub mod config;
pub mod controller;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod safety;
pub mod state;

pub use config::{ArmConfig, MotionConfig, Waypoint, Waypoints, WorkspaceEnvelope};
pub use controller::{ArmController, MotionController};
pub use driver::{EffectorCommand, MotionDriver, MotionRequest};
pub use drivers::simulated::{DriverCommand, Fault, SimulatedDriver, SimulationLog};
#[cfg(feature = "serial")]
pub use drivers::serial::SerialDriver;
pub use error::ArmError;
pub use safety::SafetyValidator;
pub use state::{ArmPosition, ArmState, ConnectionStatus, EffectorState};
