//! Run-scoped counters and the operator report

use crate::stage::CardStage;
use cardsort_arm::{ArmError, ArmState};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters of one batch invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub cards_requested: u32,
    /// Cards that reached `Recorded`, successfully or not
    pub cards_processed: u32,
    pub cards_succeeded: u32,
    pub cards_failed: u32,
    /// Card in flight when the batch halted
    pub cards_aborted: u32,
    pub started_at: DateTime<Utc>,
}

impl BatchRun {
    pub fn new(cards_requested: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cards_requested,
            cards_processed: 0,
            cards_succeeded: 0,
            cards_failed: 0,
            cards_aborted: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.cards_processed += 1;
        self.cards_succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.cards_processed += 1;
        self.cards_failed += 1;
    }

    pub fn record_abort(&mut self) {
        self.cards_aborted += 1;
    }

    pub fn elapsed_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Succeeded share of processed cards, in percent
    pub fn success_rate(&self) -> f64 {
        if self.cards_processed == 0 {
            return 0.0;
        }
        self.cards_succeeded as f64 * 100.0 / self.cards_processed as f64
    }

    /// Processed cards per minute
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.cards_processed as f64 * 60.0 / elapsed
    }
}

impl fmt::Display for BatchRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}/{} | succeeded {} | failed {} | aborted {} | success rate {:.1}% | {:.1} cards/min",
            self.cards_processed,
            self.cards_requested,
            self.cards_succeeded,
            self.cards_failed,
            self.cards_aborted,
            self.success_rate(),
            self.throughput()
        )
    }
}

/// Why a batch halted
#[derive(Debug, Clone, PartialEq)]
pub enum HaltCause {
    Arm(ArmError),
    Storage(String),
    ActuatorFaultLimit(u32),
}

impl fmt::Display for HaltCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltCause::Arm(err) => write!(f, "{}", err),
            HaltCause::Storage(msg) => write!(f, "Storage failure: {}", msg),
            HaltCause::ActuatorFaultLimit(n) => {
                write!(f, "{} consecutive end effector faults", n)
            }
        }
    }
}

/// The single recovery `home()` made after a halt
#[derive(Debug, Clone, PartialEq)]
pub enum HomeAttempt {
    Succeeded,
    Failed(ArmError),
    /// The halting fault was itself a failed `home()`
    NotRetried,
}

impl fmt::Display for HomeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HomeAttempt::Succeeded => f.write_str("succeeded"),
            HomeAttempt::Failed(err) => write!(f, "failed ({})", err),
            HomeAttempt::NotRetried => f.write_str("not retried, home() itself failed"),
        }
    }
}

/// What the operator needs to recover from a halt
#[derive(Debug, Clone, PartialEq)]
pub struct HaltReport {
    /// Card being handled, `None` when the halt happened outside a card cycle
    pub card: Option<u32>,
    pub stage: CardStage,
    pub reason: HaltCause,
    pub home_attempt: HomeAttempt,
    /// Arm state after the recovery attempt
    pub arm_state: ArmState,
}

impl HaltReport {
    /// The arm needs a manual re-home before the next batch
    pub fn needs_operator(&self) -> bool {
        !self.arm_state.is_known()
    }
}

impl fmt::Display for HaltReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.card {
            Some(card) => writeln!(f, "HALTED at card {} during {}", card, self.stage)?,
            None => writeln!(f, "HALTED during {}", self.stage)?,
        }
        writeln!(f, "  Reason:        {}", self.reason)?;
        writeln!(f, "  Recovery home: {}", self.home_attempt)?;
        write!(f, "  Arm state:     {}", self.arm_state)?;
        if self.needs_operator() {
            write!(f, "\n  Arm position is unknown: re-home manually before the next batch")?;
        }
        Ok(())
    }
}

/// Final outcome of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub run: BatchRun,
    pub halt: Option<HaltReport>,
    pub cancelled: bool,
    pub arm_state: ArmState,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_halted() {
            "halted"
        } else if self.cancelled {
            "cancelled"
        } else {
            "completed"
        };
        writeln!(f, "Batch {} {}", self.run.run_id, status)?;
        writeln!(f, "  Requested:  {}", self.run.cards_requested)?;
        writeln!(f, "  Processed:  {}", self.run.cards_processed)?;
        writeln!(f, "  Succeeded:  {}", self.run.cards_succeeded)?;
        writeln!(f, "  Failed:     {}", self.run.cards_failed)?;
        writeln!(f, "  Aborted:    {}", self.run.cards_aborted)?;
        writeln!(f, "  Success:    {:.1}%", self.run.success_rate())?;
        write!(f, "  Elapsed:    {:.1}s", self.run.elapsed_secs())?;
        match &self.halt {
            Some(halt) => write!(f, "\n{}", halt),
            None => write!(f, "\n  Arm state:  {}", self.arm_state),
        }
    }
}

/// Run-level abort signal, checked between cards
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
