//! Workspace envelope validation

use crate::config::{Waypoint, WorkspaceEnvelope};
use crate::error::ArmError;
use cardsort_core::{Pose, WaypointName};

/// Validates move targets against the workspace envelope.
///
/// Runs before every move, so a waypoint edited outside its calibrated range
/// is refused even if the configuration loaded without complaint.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    envelope: WorkspaceEnvelope,
}

impl SafetyValidator {
    pub fn new(envelope: WorkspaceEnvelope) -> Self {
        Self { envelope }
    }

    pub fn envelope(&self) -> &WorkspaceEnvelope {
        &self.envelope
    }

    /// Check every pose the arm would pass through to reach `waypoint`
    pub fn validate_waypoint(&self, name: WaypointName, waypoint: &Waypoint) -> Result<(), ArmError> {
        if let Some(approach) = &waypoint.approach {
            self.validate_pose(approach).map_err(|reason| ArmError::SafetyViolation {
                waypoint: name,
                reason: format!("approach {}", reason),
            })?;
        }

        self.validate_pose(&waypoint.pose)
            .map_err(|reason| ArmError::SafetyViolation {
                waypoint: name,
                reason,
            })
    }

    /// Returns the first violated bound as a reason string
    pub fn validate_pose(&self, pose: &Pose) -> Result<(), String> {
        if !pose.is_finite() {
            return Err(format!("pose {} is not finite", pose));
        }

        let e = &self.envelope;
        let checks = [
            ("x", pose.x, e.x_min, e.x_max),
            ("y", pose.y, e.y_min, e.y_max),
            ("z", pose.z, e.z_min, e.z_max),
        ];
        for (axis, value, min, max) in checks {
            if value < min || value > max {
                return Err(format!(
                    "{}={:.1} outside [{:.1}, {:.1}]",
                    axis, value, min, max
                ));
            }
        }

        Ok(())
    }
}
