//! Move session: conventional dynamics interleaved with NCMC cycles

use log::{info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::ncmc::engine::{CycleOutcome, CycleReport, NcmcEngine};
use crate::ncmc::schedule::Direction;
use crate::ncmc::NcmcError;

/// Archived result of one NCMC cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub iteration: u64,
    pub outcome: CycleOutcome,

    /// Protocol work (kJ/mol); `None` when the cycle failed
    pub work: Option<f64>,

    pub perturbation_energy: Option<f64>,
    pub acceptance_probability: Option<f64>,
    pub direction: Direction,

    /// Error message of a failed cycle
    pub error: Option<String>,
}

impl CycleRecord {
    fn from_report(report: &CycleReport, direction: Direction) -> Self {
        Self {
            iteration: report.iteration,
            outcome: report.outcome,
            work: report.work.as_ref().map(|w| w.total),
            perturbation_energy: report.work.as_ref().and_then(|w| w.perturbation_energy),
            acceptance_probability: report.acceptance_probability,
            direction,
            error: report.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Append-only statistics over a session's cycles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveStatistics {
    proposed: u64,
    accepted: u64,
    rejected: u64,
    failed: u64,
    records: Vec<CycleRecord>,
}

impl MoveStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cycle; failed cycles count as rejected too
    pub fn push(&mut self, record: CycleRecord) {
        self.proposed += 1;
        match record.outcome {
            CycleOutcome::Accepted => self.accepted += 1,
            CycleOutcome::Rejected => self.rejected += 1,
            CycleOutcome::InvalidProposal | CycleOutcome::IntegratorFailure => {
                self.rejected += 1;
                self.failed += 1;
            }
        }
        self.records.push(record);
    }

    pub fn proposed(&self) -> u64 {
        self.proposed
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Cycles that ended with an invalid proposal or integrator failure
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// accepted / proposed, or 0 before any cycle ran
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    /// Work of every completed cycle, accepted or rejected, in order
    pub fn work_values(&self) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.work).collect()
    }

    pub fn forward_work(&self) -> Vec<f64> {
        self.work_in(Direction::Forward)
    }

    pub fn backward_work(&self) -> Vec<f64> {
        self.work_in(Direction::Backward)
    }

    fn work_in(&self, direction: Direction) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.direction == direction)
            .filter_map(|r| r.work)
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CycleRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A cycle that ended without reaching the acceptance test
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub iteration: u64,
    pub error: NcmcError,
}

/// Totals for one `run_iterations` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub iterations: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub acceptance_rate: f64,

    /// Every failed cycle of this call, in order
    #[serde(skip)]
    pub failures: Vec<CycleFailure>,
}

/// Binds one engine to one simulation context
pub struct MoveSession<C: SimulationContext> {
    context: C,
    engine: NcmcEngine,
    md_steps: usize,
    statistics: MoveStatistics,
    last_error: Option<NcmcError>,
}

impl<C: SimulationContext> MoveSession<C> {
    /// `md_steps` conventional dynamics steps precede every NCMC cycle
    pub fn new(context: C, engine: NcmcEngine, md_steps: usize) -> Self {
        Self {
            context,
            engine,
            md_steps,
            statistics: MoveStatistics::new(),
            last_error: None,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn engine(&self) -> &NcmcEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut NcmcEngine {
        &mut self.engine
    }

    pub fn statistics(&self) -> &MoveStatistics {
        &self.statistics
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.statistics.acceptance_rate()
    }

    pub fn work_values(&self) -> Vec<f64> {
        self.statistics.work_values()
    }

    /// Error of the most recent failed cycle
    pub fn last_error(&self) -> Option<&NcmcError> {
        self.last_error.as_ref()
    }

    pub fn run_iterations<R: RngCore>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<SessionSummary, NcmcError> {
        self.run_iterations_with(count, rng, |_, _| {})
    }

    /// Run `count` iterations, calling `on_cycle` after each cycle with the
    /// archived record and the context in its post-cycle state
    pub fn run_iterations_with<R, F>(
        &mut self,
        count: usize,
        rng: &mut R,
        mut on_cycle: F,
    ) -> Result<SessionSummary, NcmcError>
    where
        R: RngCore,
        F: FnMut(&CycleRecord, &C),
    {
        let accepted_before = self.statistics.accepted();
        let rejected_before = self.statistics.rejected();
        let failed_before = self.statistics.failed();
        let direction = self.engine.schedule().direction();
        let mut failures = Vec::new();

        for _ in 0..count {
            if self.md_steps > 0 {
                self.context
                    .set_coupling(self.engine.schedule().start())
                    .map_err(NcmcError::Dynamics)?;
                self.context
                    .advance(self.md_steps)
                    .map_err(NcmcError::Dynamics)?;
            }

            let report = self.engine.run_cycle(&mut self.context, rng)?;
            let record = CycleRecord::from_report(&report, direction);
            if let Some(error) = report.error {
                warn!("Iteration {} failed: {}", report.iteration, error);
                failures.push(CycleFailure {
                    iteration: report.iteration,
                    error: error.clone(),
                });
                self.last_error = Some(error);
            }
            on_cycle(&record, &self.context);
            self.statistics.push(record);
        }

        let summary = SessionSummary {
            iterations: count,
            accepted: self.statistics.accepted() - accepted_before,
            rejected: self.statistics.rejected() - rejected_before,
            failed: self.statistics.failed() - failed_before,
            acceptance_rate: self.statistics.acceptance_rate(),
            failures,
        };
        info!(
            "Ran {} iterations: {} accepted, {} rejected ({} failed), acceptance rate {:.3}",
            summary.iterations,
            summary.accepted,
            summary.rejected,
            summary.failed,
            summary.acceptance_rate
        );
        Ok(summary)
    }
}
