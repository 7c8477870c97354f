//! Domain types for the sorting cell

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Named, pre-calibrated arm pose.
///
/// The set is closed: the cell never moves to a pose that is not one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointName {
    Home,
    CardPile,
    ScanPosition,
    SuccessPile,
    FailedPile,
}

impl WaypointName {
    pub const ALL: [WaypointName; 5] = [
        WaypointName::Home,
        WaypointName::CardPile,
        WaypointName::ScanPosition,
        WaypointName::SuccessPile,
        WaypointName::FailedPile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaypointName::Home => "home",
            WaypointName::CardPile => "card_pile",
            WaypointName::ScanPosition => "scan_position",
            WaypointName::SuccessPile => "success_pile",
            WaypointName::FailedPile => "failed_pile",
        }
    }
}

impl fmt::Display for WaypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaypointName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WaypointName::ALL
            .iter()
            .copied()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown waypoint '{}'", s)))
    }
}

/// Cartesian position (mm) and orientation (degrees) of the end effector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub rx: f64,
    #[serde(default)]
    pub ry: f64,
    #[serde(default)]
    pub rz: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_orientation(mut self, rx: f64, ry: f64, rz: f64) -> Self {
        self.rx = rx;
        self.ry = ry;
        self.rz = rz;
        self
    }

    /// All six components are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1} | {:.1}, {:.1}, {:.1})",
            self.x, self.y, self.z, self.rx, self.ry, self.rz
        )
    }
}

/// Output pile a card is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pile {
    Success,
    Failed,
}

impl Pile {
    /// Waypoint above the pile
    pub fn waypoint(&self) -> WaypointName {
        match self {
            Pile::Success => WaypointName::SuccessPile,
            Pile::Failed => WaypointName::FailedPile,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pile::Success => "success",
            Pile::Failed => "failed",
        }
    }
}

impl fmt::Display for Pile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one recognition pass over a card.
///
/// Low confidence and format mismatches are ordinary outcomes with
/// `accepted == false`, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Text as returned by the recognizer, before normalization
    pub raw_text: String,
    /// Normalized code, `None` when nothing was read
    pub normalized_code: Option<String>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Recognizer that produced the reading
    pub engine: String,
    /// Number of acquisition attempts spent
    pub attempt_count: u32,
    /// Confidence met the threshold and the code matched the expected format
    pub accepted: bool,
    /// Stored copy of the frame the reading came from
    pub image_reference: Option<PathBuf>,
}

impl RecognitionResult {
    /// Result for a card where no reading could be obtained at all
    pub fn empty(engine: impl Into<String>, attempt_count: u32) -> Self {
        Self {
            raw_text: String::new(),
            normalized_code: None,
            confidence: 0.0,
            engine: engine.into(),
            attempt_count,
            accepted: false,
            image_reference: None,
        }
    }
}

/// Identifier of a persisted scan record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What physically happened to a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardOutcome {
    /// Placed on its destination pile
    Sorted,
    /// Gripper failed at the supply pile
    PickFailed,
    /// Gripper failed while placing, card presumed dropped
    Dropped,
    /// Batch halted while the card was held
    Aborted,
}

impl CardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardOutcome::Sorted => "sorted",
            CardOutcome::PickFailed => "pick_failed",
            CardOutcome::Dropped => "dropped",
            CardOutcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted, append-only record of one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: RecordId,
    pub run_id: Uuid,
    /// 1-based position of the card in its batch
    pub card_index: u32,
    pub timestamp: DateTime<Utc>,
    pub normalized_code: Option<String>,
    #[serde(default)]
    pub raw_text: String,
    pub confidence: f64,
    pub accepted: bool,
    #[serde(default)]
    pub engine: Option<String>,
    pub destination: Option<Pile>,
    pub outcome: CardOutcome,
    pub image_reference: Option<PathBuf>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ScanRecord {
    /// Record for a card that was scanned and routed
    pub fn scanned(
        run_id: Uuid,
        card_index: u32,
        result: &RecognitionResult,
        destination: Pile,
        outcome: CardOutcome,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            run_id,
            card_index,
            timestamp: Utc::now(),
            normalized_code: result.normalized_code.clone(),
            raw_text: result.raw_text.clone(),
            confidence: result.confidence,
            accepted: result.accepted,
            engine: Some(result.engine.clone()),
            destination: Some(destination),
            outcome,
            image_reference: result.image_reference.clone(),
            note: None,
        }
    }

    /// Record for a card that never reached the camera
    pub fn unscanned(run_id: Uuid, card_index: u32, outcome: CardOutcome) -> Self {
        Self {
            id: RecordId::generate(),
            run_id,
            card_index,
            timestamp: Utc::now(),
            normalized_code: None,
            raw_text: String::new(),
            confidence: 0.0,
            accepted: false,
            engine: None,
            destination: None,
            outcome,
            image_reference: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Accepted and actually placed on the success pile.
    ///
    /// A card read correctly but dropped or aborted afterwards is a failed card.
    pub fn is_success(&self) -> bool {
        self.accepted && self.outcome == CardOutcome::Sorted
    }
}
