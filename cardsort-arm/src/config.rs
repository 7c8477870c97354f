//! Configuration for cardsort-arm

use cardsort_core::{Pose, WaypointName};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calibrated waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Pose the arm reaches at the waypoint
    pub pose: Pose,
    /// Calibrated hover pose passed through on the way in and used to retract
    #[serde(default)]
    pub approach: Option<Pose>,
}

impl Waypoint {
    pub fn at(pose: Pose) -> Self {
        Self {
            pose,
            approach: None,
        }
    }

    pub fn with_approach(mut self, approach: Pose) -> Self {
        self.approach = Some(approach);
        self
    }
}

/// The complete, fixed set of calibrated waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Waypoints {
    pub home: Waypoint,
    pub card_pile: Waypoint,
    pub scan_position: Waypoint,
    pub success_pile: Waypoint,
    pub failed_pile: Waypoint,
}

impl Waypoints {
    pub fn get(&self, name: WaypointName) -> &Waypoint {
        match name {
            WaypointName::Home => &self.home,
            WaypointName::CardPile => &self.card_pile,
            WaypointName::ScanPosition => &self.scan_position,
            WaypointName::SuccessPile => &self.success_pile,
            WaypointName::FailedPile => &self.failed_pile,
        }
    }

    pub fn get_mut(&mut self, name: WaypointName) -> &mut Waypoint {
        match name {
            WaypointName::Home => &mut self.home,
            WaypointName::CardPile => &mut self.card_pile,
            WaypointName::ScanPosition => &mut self.scan_position,
            WaypointName::SuccessPile => &mut self.success_pile,
            WaypointName::FailedPile => &mut self.failed_pile,
        }
    }
}

impl Default for Waypoints {
    fn default() -> Self {
        Self {
            home: Waypoint::at(Pose::new(0.0, 150.0, 200.0)),
            card_pile: Waypoint::at(Pose::new(200.0, 0.0, 50.0).with_orientation(0.0, 90.0, 0.0)),
            scan_position: Waypoint::at(Pose::new(0.0, -150.0, 80.0)),
            success_pile: Waypoint::at(
                Pose::new(-200.0, 0.0, 50.0).with_orientation(0.0, 90.0, 0.0),
            ),
            failed_pile: Waypoint::at(
                Pose::new(-200.0, 100.0, 50.0).with_orientation(0.0, 90.0, 0.0),
            ),
        }
    }
}

/// Axis-aligned box the end effector must stay inside (mm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceEnvelope {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for WorkspaceEnvelope {
    fn default() -> Self {
        Self {
            x_min: -300.0,
            x_max: 300.0,
            y_min: -200.0,
            y_max: 200.0,
            z_min: 0.0,
            z_max: 300.0,
        }
    }
}

/// Motion and end effector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Feed rate sent with every move
    pub speed: f64,
    pub acceleration: f64,
    /// Effector setpoint for open/release
    pub gripper_open_value: u32,
    /// Effector setpoint for close/grip
    pub gripper_close_value: u32,
    /// Settle time after closing
    pub grip_delay_ms: u64,
    /// Settle time after opening
    pub release_delay_ms: u64,
    /// Upper bound for a single move leg
    pub move_timeout_ms: u64,
    /// Upper bound for an effector command or grip sensor read
    pub actuator_timeout_ms: u64,
    /// Upper bound for opening the control channel
    pub connect_timeout_ms: u64,
    /// Read the grip sensor after pick and place
    pub verify_grip: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: 50.0,
            acceleration: 30.0,
            gripper_open_value: 100,
            gripper_close_value: 0,
            grip_delay_ms: 500,
            release_delay_ms: 300,
            move_timeout_ms: 10_000,
            actuator_timeout_ms: 2_000,
            connect_timeout_ms: 5_000,
            verify_grip: true,
        }
    }
}

impl MotionConfig {
    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn grip_delay(&self) -> Duration {
        Duration::from_millis(self.grip_delay_ms)
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }
}

/// Arm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Serial device of the arm controller
    pub port: String,
    pub baudrate: u32,
    /// Read timeout for a single firmware reply line
    pub command_timeout_ms: u64,
    pub waypoints: Waypoints,
    pub envelope: WorkspaceEnvelope,
    pub motion: MotionConfig,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 115_200,
            command_timeout_ms: 1_000,
            waypoints: Waypoints::default(),
            envelope: WorkspaceEnvelope::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl ArmConfig {
    /// Validate configuration.
    ///
    /// Waypoints are not checked against the envelope here: that check runs on
    /// every move so a drifted waypoint is reported where it is used.
    pub fn validate(&self) -> Result<(), String> {
        if self.port.trim().is_empty() {
            return Err("Arm port must not be empty".to_string());
        }

        if self.baudrate == 0 {
            return Err("Baudrate must be greater than 0".to_string());
        }

        if self.command_timeout_ms == 0 {
            return Err("Command timeout must be greater than 0".to_string());
        }

        let m = &self.motion;
        if !m.speed.is_finite() || m.speed <= 0.0 {
            return Err("Motion speed must be a positive number".to_string());
        }
        if !m.acceleration.is_finite() || m.acceleration <= 0.0 {
            return Err("Motion acceleration must be a positive number".to_string());
        }
        if m.move_timeout_ms == 0 || m.actuator_timeout_ms == 0 || m.connect_timeout_ms == 0 {
            return Err("Move, actuator and connect timeouts must be greater than 0".to_string());
        }

        let e = &self.envelope;
        let axes = [
            ("x", e.x_min, e.x_max),
            ("y", e.y_min, e.y_max),
            ("z", e.z_min, e.z_max),
        ];
        for (axis, min, max) in axes {
            if !min.is_finite() || !max.is_finite() {
                return Err(format!("Envelope bounds for {} must be finite", axis));
            }
            if min >= max {
                return Err(format!(
                    "Envelope {}_min ({}) must be below {}_max ({})",
                    axis, min, axis, max
                ));
            }
        }

        for name in WaypointName::ALL {
            let waypoint = self.waypoints.get(name);
            if !waypoint.pose.is_finite() {
                return Err(format!("Waypoint {} has a non-finite pose", name));
            }
            if let Some(approach) = waypoint.approach {
                if !approach.is_finite() {
                    return Err(format!("Waypoint {} has a non-finite approach pose", name));
                }
            }
        }

        Ok(())
    }
}
