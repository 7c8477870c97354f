//! Per-card state machine stages and routing

use cardsort_core::{Pile, RecognitionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a card is in its cycle.
///
/// A card moves `Idle → Picking → MovingToScan → Scanning → Routing →
/// Placing → Recorded → Idle`. `Halted` ends the batch and is reachable
/// from every other stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStage {
    Idle,
    Picking,
    MovingToScan,
    Scanning,
    Routing,
    Placing,
    Recorded,
    Halted,
}

impl CardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStage::Idle => "idle",
            CardStage::Picking => "picking",
            CardStage::MovingToScan => "moving_to_scan",
            CardStage::Scanning => "scanning",
            CardStage::Routing => "routing",
            CardStage::Placing => "placing",
            CardStage::Recorded => "recorded",
            CardStage::Halted => "halted",
        }
    }

    /// Whether a card in this stage has been under the camera
    pub fn reached_scan(&self) -> bool {
        matches!(
            self,
            CardStage::Scanning | CardStage::Routing | CardStage::Placing | CardStage::Recorded
        )
    }
}

impl fmt::Display for CardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination pile for a recognition result
pub fn route(result: &RecognitionResult) -> Pile {
    if result.accepted {
        Pile::Success
    } else {
        Pile::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: Option<&str>, confidence: f64, accepted: bool) -> RecognitionResult {
        RecognitionResult {
            raw_text: code.unwrap_or_default().to_string(),
            normalized_code: code.map(str::to_string),
            confidence,
            engine: "scripted".to_string(),
            attempt_count: 1,
            accepted,
            image_reference: None,
        }
    }

    #[test]
    fn test_route_follows_accepted_flag() {
        assert_eq!(route(&result(Some("ABC-12345"), 0.82, true)), Pile::Success);
        // High confidence does not override a rejected format
        assert_eq!(route(&result(Some("ABC-123X5"), 0.91, false)), Pile::Failed);
        assert_eq!(route(&RecognitionResult::empty("scripted", 3)), Pile::Failed);
    }

    #[test]
    fn test_route_is_deterministic() {
        let r = result(Some("AB-1000"), 0.7, true);
        assert!((0..10).all(|_| route(&r) == Pile::Success));
    }

    #[test]
    fn test_reached_scan() {
        assert!(!CardStage::Picking.reached_scan());
        assert!(!CardStage::MovingToScan.reached_scan());
        assert!(CardStage::Scanning.reached_scan());
        assert!(CardStage::Placing.reached_scan());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(CardStage::MovingToScan.to_string(), "moving_to_scan");
    }
}
