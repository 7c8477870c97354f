//! Motion driver abstraction

use crate::error::ArmError;
use async_trait::async_trait;
use cardsort_core::{Pose, WaypointName};
use std::fmt;

/// A single leg sent to the driver
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Waypoint the leg belongs to
    pub waypoint: WaypointName,
    pub pose: Pose,
    pub speed: f64,
    pub acceleration: f64,
    /// Leg through the waypoint's approach pose rather than onto the waypoint
    pub approach: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectorCommand {
    /// Release
    Open,
    /// Grip
    Close,
}

impl fmt::Display for EffectorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectorCommand::Open => f.write_str("open"),
            EffectorCommand::Close => f.write_str("close"),
        }
    }
}

/// Low-level link to the arm hardware.
///
/// Drivers report completion or failure; timeouts are applied by the
/// controller, so a driver may block for as long as the hardware takes.
#[async_trait]
pub trait MotionDriver: Send {
    /// Driver name for logs
    fn name(&self) -> &str;

    /// Open the control channel
    async fn open(&mut self) -> Result<(), ArmError>;

    /// Close the control channel
    async fn close(&mut self) -> Result<(), ArmError>;

    /// Move and wait until the motion has finished
    async fn move_to_pose(&mut self, request: &MotionRequest) -> Result<(), ArmError>;

    /// Drive the end effector to `value`
    async fn set_effector(&mut self, command: EffectorCommand, value: u32) -> Result<(), ArmError>;

    /// Whether the effector currently holds a card, `None` without a sensor
    async fn grip_feedback(&mut self) -> Result<Option<bool>, ArmError> {
        Ok(None)
    }

    fn is_open(&self) -> bool;
}
