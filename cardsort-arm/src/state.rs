//! Arm state owned by the controller

use cardsort_core::WaypointName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the arm is, as far as the controller knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPosition {
    /// At rest on a waypoint
    Known(WaypointName),
    /// In motion, faulted, or never homed
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectorState {
    #[default]
    Open,
    Closed,
}

/// Snapshot of the arm.
///
/// Only the controller mutates it; everyone else reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    pub position: ArmPosition,
    pub connection: ConnectionStatus,
    pub effector: EffectorState,
    /// A motion or actuation is in flight
    pub busy: bool,
    pub last_error: Option<String>,
}

impl Default for ArmState {
    fn default() -> Self {
        Self {
            position: ArmPosition::Unknown,
            connection: ConnectionStatus::Disconnected,
            effector: EffectorState::Open,
            busy: false,
            last_error: None,
        }
    }
}

impl ArmState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    pub fn is_known(&self) -> bool {
        matches!(self.position, ArmPosition::Known(_))
    }

    pub fn waypoint(&self) -> Option<WaypointName> {
        match self.position {
            ArmPosition::Known(name) => Some(name),
            ArmPosition::Unknown => None,
        }
    }
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = match self.position {
            ArmPosition::Known(name) => name.as_str(),
            ArmPosition::Unknown => "unknown",
        };
        let connection = match self.connection {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        let effector = match self.effector {
            EffectorState::Open => "open",
            EffectorState::Closed => "closed",
        };
        write!(
            f,
            "position={} connection={} effector={} busy={}",
            position, connection, effector, self.busy
        )?;
        if let Some(err) = &self.last_error {
            write!(f, " last_error=\"{}\"", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ArmState::default();
        assert!(!state.is_connected());
        assert!(!state.is_known());
        assert_eq!(state.effector, EffectorState::Open);
        assert!(state.waypoint().is_none());
    }

    #[test]
    fn test_display() {
        let state = ArmState {
            position: ArmPosition::Known(WaypointName::ScanPosition),
            connection: ConnectionStatus::Connected,
            effector: EffectorState::Closed,
            busy: false,
            last_error: Some("stall".to_string()),
        };
        assert_eq!(
            state.to_string(),
            "position=scan_position connection=connected effector=closed busy=false last_error=\"stall\""
        );
    }
}
