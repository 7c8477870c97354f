//! Error types for cardsort-arm

use cardsort_core::WaypointName;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Safety violation at {waypoint}: {reason}")]
    SafetyViolation {
        waypoint: WaypointName,
        reason: String,
    },

    #[error("Motion fault: {0}")]
    MotionFault(String),

    #[error("Actuator fault: {0}")]
    ActuatorFault(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArmError {
    /// Whether the fault must halt the whole batch.
    ///
    /// Only end effector faults are scoped to a single card.
    pub fn is_run_fatal(&self) -> bool {
        !matches!(self, ArmError::ActuatorFault(_))
    }

    /// Short name of the fault class
    pub fn kind(&self) -> &'static str {
        match self {
            ArmError::Connection(_) => "connection",
            ArmError::InvalidTransition(_) => "invalid_transition",
            ArmError::SafetyViolation { .. } => "safety_violation",
            ArmError::MotionFault(_) => "motion_fault",
            ArmError::ActuatorFault(_) => "actuator_fault",
            ArmError::Config(_) => "config",
        }
    }

    /// Message without the class prefix
    pub fn detail(&self) -> String {
        match self {
            ArmError::Connection(msg)
            | ArmError::InvalidTransition(msg)
            | ArmError::MotionFault(msg)
            | ArmError::ActuatorFault(msg)
            | ArmError::Config(msg) => msg.clone(),
            ArmError::SafetyViolation { waypoint, reason } => format!("{}: {}", waypoint, reason),
        }
    }
}
