//! cardsort-core: domain types shared by every crate of the sorting cell
//!
//! Provides:
//! - Calibrated waypoint names and arm poses
//! - Sorting piles and the routing target of each pile
//! - Recognition results and the append-only scan record
//! - The core error type

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CardOutcome, Pile, Pose, RecognitionResult, RecordId, ScanRecord, WaypointName,
};
