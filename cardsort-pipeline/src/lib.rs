//! cardsort-pipeline: the card sorting cell's batch loop
//!
//! Provides:
//! - The per-card state machine (pick, scan, route, place, record)
//! - Halt policy for run-fatal motion faults, with a single recovery home
//! - Per-card handling of end effector faults with a consecutive-fault limit
//! - Batch counters, operator report and between-card cancellation
//! - Aggregated configuration loading (YAML or TOML)

pub mod batch;
pub mod cell;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod stage;

pub use batch::{BatchRun, BatchSummary, CancelFlag, HaltCause, HaltReport, HomeAttempt};
pub use cell::{build_engine, build_motion, open_store};
pub use config::{LoggingConfig, PipelineConfig, SorterConfig};
pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use stage::{route, CardStage};
