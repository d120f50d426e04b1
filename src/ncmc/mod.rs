//! Nonequilibrium candidate Monte Carlo: switching schedules, work
//! accounting, acceptance and the engine/session driving them

pub mod acceptance;
pub mod engine;
pub mod schedule;
pub mod session;
pub mod work;

use thiserror::Error;

use crate::context::ContextError;
use crate::moves::ProposalError;
use schedule::ScheduleError;
use work::WorkError;

/// Errors that can occur while building or running NCMC cycles
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NcmcError {
    #[error("Schedule misconfiguration: {0}")]
    ScheduleMisconfiguration(#[from] ScheduleError),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(#[from] ProposalError),

    #[error("Integrator failure while {phase}: {source}")]
    IntegratorFailure {
        phase: &'static str,
        source: ContextError,
    },

    #[error("Numeric overflow in work accumulation: {0}")]
    NumericOverflow(#[from] WorkError),

    #[error("Conventional dynamics failed: {0}")]
    Dynamics(ContextError),

    #[error("Failed to restore the pre-cycle configuration: {0}")]
    RestoreFailed(ContextError),

    #[error("Invalid engine parameters: {0}")]
    InvalidParameters(String),
}

impl NcmcError {
    /// True for errors that end only the current cycle
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NcmcError::InvalidProposal(_)
                | NcmcError::IntegratorFailure { .. }
                | NcmcError::NumericOverflow(_)
        )
    }
}

pub use acceptance::AcceptanceTest;
pub use engine::{CycleOutcome, CycleReport, EngineParams, EngineState, NcmcEngine, PerturbationWork};
pub use schedule::{Direction, SwitchingSchedule};
pub use session::{CycleFailure, CycleRecord, MoveSession, MoveStatistics, SessionSummary};
pub use work::{WorkAccumulator, WorkRecord};
