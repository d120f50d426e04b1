//! The NCMC engine: relax, perturb, re-couple, decide
//!
//! One call to [`NcmcEngine::run_cycle`] walks the state machine
//! `Idle -> Relaxing -> Perturbing -> ReCoupling -> Deciding -> {Accepted, Rejected} -> Idle`.
//! Work for a λ step is the potential energy change caused by the λ change
//! alone, evaluated at fixed positions before the context is propagated.
//! Any failure after the snapshot ends the cycle as a rejection with the
//! snapshot restored; the error is returned in the cycle report.

use log::{debug, info, warn};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::context::{thermal_energy, ContextError, SimulationContext};
use crate::configuration::Configuration;
use crate::moves::{Move, MoveDelta, ProposalError};
use crate::ncmc::acceptance::AcceptanceTest;
use crate::ncmc::schedule::SwitchingSchedule;
use crate::ncmc::work::{WorkAccumulator, WorkRecord};
use crate::ncmc::NcmcError;
use crate::reporters::{NcmcReporter, StepReport};

/// Whether the energy change of the structural move counts as work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerturbationWork {
    /// Log the change only. Valid only when the move happens at a fully
    /// decoupled λ, where the change is zero anyway.
    Exclude,
    /// Add the change to the cycle's work
    #[default]
    Include,
}

/// Parameters for the NCMC engine
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Thermal energy kT (kJ/mol) used by the acceptance test
    pub kt: f64,

    /// Integrator steps taken after every λ change
    pub propagation_steps: usize,

    pub perturbation_work: PerturbationWork,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            kt: thermal_energy(300.0),
            propagation_steps: 1,
            perturbation_work: PerturbationWork::Include,
        }
    }
}

/// States of the engine's cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Relaxing,
    Perturbing,
    ReCoupling,
    Deciding,
    Accepted,
    Rejected,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Accepted,
    Rejected,
    /// The move violated a hard constraint; rejected without a random draw
    InvalidProposal,
    /// The context failed or produced non-finite energies; rejected
    IntegratorFailure,
}

impl CycleOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CycleOutcome::Accepted)
    }

    /// True when the cycle did not complete its protocol
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CycleOutcome::InvalidProposal | CycleOutcome::IntegratorFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Accepted => "accepted",
            CycleOutcome::Rejected => "rejected",
            CycleOutcome::InvalidProposal => "invalid_proposal",
            CycleOutcome::IntegratorFailure => "integrator_failure",
        }
    }
}

/// Result of one NCMC cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub iteration: u64,
    pub outcome: CycleOutcome,

    /// Work of a completed protocol; `None` for failed cycles
    pub work: Option<WorkRecord>,

    pub acceptance_probability: Option<f64>,

    /// The applied move, if one was drawn
    pub delta: Option<MoveDelta>,

    /// Why a failed cycle was aborted
    pub error: Option<NcmcError>,
}

struct Decision {
    delta: MoveDelta,
    probability: f64,
    accepted: bool,
}

/// Drives the relax, perturb, re-couple protocol and the acceptance test
pub struct NcmcEngine {
    schedule: SwitchingSchedule,
    mover: Box<dyn Move>,
    acceptance: AcceptanceTest,
    params: EngineParams,
    work: WorkAccumulator,
    state: EngineState,
    reporters: Vec<Box<dyn NcmcReporter>>,
    cycles: u64,
}

impl NcmcEngine {
    /// Build an engine; a malformed schedule or kT is fatal here
    pub fn new(
        schedule: SwitchingSchedule,
        mover: Box<dyn Move>,
        params: EngineParams,
    ) -> Result<Self, NcmcError> {
        schedule.validate()?;
        let acceptance = AcceptanceTest::new(params.kt)?;
        if schedule.is_degenerate() {
            warn!("Zero-step switching schedule: moves are applied instantaneously");
        }
        if params.perturbation_work == PerturbationWork::Exclude
            && schedule.lambda(schedule.midpoint()) != 0.5
        {
            warn!(
                "Move energy is excluded from the work but the move runs at lambda = {:.4}, \
                 not at the decoupled midpoint",
                schedule.lambda(schedule.midpoint())
            );
        }

        Ok(Self {
            work: WorkAccumulator::with_capacity(schedule.steps() + 1),
            schedule,
            mover,
            acceptance,
            params,
            state: EngineState::Idle,
            reporters: Vec::new(),
            cycles: 0,
        })
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn NcmcReporter>) {
        self.reporters.push(reporter);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn schedule(&self) -> &SwitchingSchedule {
        &self.schedule
    }

    pub fn mover(&self) -> &dyn Move {
        self.mover.as_ref()
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn acceptance(&self) -> &AcceptanceTest {
        &self.acceptance
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn transition(&mut self, next: EngineState) {
        debug!("NCMC engine: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one full NCMC cycle on `context`.
    ///
    /// `rng` is consumed by the move proposal and by exactly one uniform
    /// draw for the acceptance test. Cycles aborted before the decision
    /// make no acceptance draw.
    ///
    /// Returns `Err` only if the pre-cycle snapshot cannot be restored.
    pub fn run_cycle<C, R>(&mut self, context: &mut C, rng: &mut R) -> Result<CycleReport, NcmcError>
    where
        C: SimulationContext + ?Sized,
        R: RngCore,
    {
        let iteration = self.cycles;
        self.cycles += 1;

        self.transition(EngineState::Relaxing);
        let snapshot = context.state();
        self.work.begin_cycle();

        match self.drive(context, rng, iteration) {
            Ok(decision) => {
                let work = self.work.record();
                let outcome = if decision.accepted {
                    self.transition(EngineState::Accepted);
                    CycleOutcome::Accepted
                } else {
                    self.transition(EngineState::Rejected);
                    self.restore(context, &snapshot)?;
                    CycleOutcome::Rejected
                };
                self.transition(EngineState::Idle);

                info!(
                    "NCMC cycle {}: {} (work = {:.4} kJ/mol, p = {:.4})",
                    iteration,
                    outcome.as_str(),
                    work.total,
                    decision.probability
                );
                Ok(CycleReport {
                    iteration,
                    outcome,
                    work: Some(work),
                    acceptance_probability: Some(decision.probability),
                    delta: Some(decision.delta),
                    error: None,
                })
            }
            Err(error) => {
                self.transition(EngineState::Rejected);
                self.restore(context, &snapshot)?;
                self.transition(EngineState::Idle);

                let outcome = match error {
                    NcmcError::InvalidProposal(_) => CycleOutcome::InvalidProposal,
                    _ => CycleOutcome::IntegratorFailure,
                };
                warn!(
                    "NCMC cycle {} aborted ({}): {}",
                    iteration,
                    outcome.as_str(),
                    error
                );
                Ok(CycleReport {
                    iteration,
                    outcome,
                    work: None,
                    acceptance_probability: None,
                    delta: None,
                    error: Some(error),
                })
            }
        }
    }

    fn drive<C, R>(&mut self, context: &mut C, rng: &mut R, iteration: u64) -> Result<Decision, NcmcError>
    where
        C: SimulationContext + ?Sized,
        R: RngCore,
    {
        let midpoint = self.schedule.midpoint();
        let steps = self.schedule.steps();

        context
            .set_coupling(self.schedule.start())
            .map_err(|source| NcmcError::IntegratorFailure {
                phase: "relaxing",
                source,
            })?;
        if !self.reporters.is_empty() {
            let initial = checked_energy(context, "relaxing")?;
            self.report(StepReport {
                iteration,
                step: 0,
                lambda: self.schedule.start(),
                protocol_work: 0.0,
                potential_energy: initial,
            });
        }
        self.switch(context, 0, midpoint, iteration, "relaxing")?;

        self.transition(EngineState::Perturbing);
        let delta = self.perturb(context, rng)?;

        self.transition(EngineState::ReCoupling);
        self.switch(context, midpoint, steps, iteration, "re-coupling")?;

        self.transition(EngineState::Deciding);
        let probability = self.acceptance.probability(self.work.total());
        let uniform: f64 = rng.gen();

        Ok(Decision {
            delta,
            probability,
            accepted: uniform < probability,
        })
    }

    /// Step λ from schedule index `from` to `to`, accumulating work
    fn switch<C>(
        &mut self,
        context: &mut C,
        from: usize,
        to: usize,
        iteration: u64,
        phase: &'static str,
    ) -> Result<(), NcmcError>
    where
        C: SimulationContext + ?Sized,
    {
        for index in from..to {
            let lambda = self.schedule.lambda(index + 1);

            let before = checked_energy(context, phase)?;
            context
                .set_coupling(lambda)
                .map_err(|source| NcmcError::IntegratorFailure { phase, source })?;
            let after = checked_energy(context, phase)?;
            let increment = self.work.accumulate(before, after)?;
            debug!(
                "{} step {}: lambda = {:.4}, dW = {:.6}, W = {:.6}",
                phase,
                index + 1,
                lambda,
                increment,
                self.work.total()
            );

            context
                .advance(self.params.propagation_steps)
                .map_err(|source| NcmcError::IntegratorFailure { phase, source })?;

            self.report(StepReport {
                iteration,
                step: index + 1,
                lambda,
                protocol_work: self.work.total(),
                potential_energy: after,
            });
        }
        Ok(())
    }

    fn perturb<C, R>(&mut self, context: &mut C, rng: &mut R) -> Result<MoveDelta, NcmcError>
    where
        C: SimulationContext + ?Sized,
        R: RngCore,
    {
        let mut state: Configuration = context.state();
        let delta = self.mover.propose(&state, &mut *rng)?;

        let before = checked_energy(context, "perturbing")?;
        delta
            .apply(&mut state, self.mover.atom_indices())
            .map_err(ProposalError::from)?;
        context
            .set_positions(&state.positions)
            .map_err(|source| NcmcError::IntegratorFailure {
                phase: "perturbing",
                source,
            })?;
        let after = checked_energy(context, "perturbing")?;

        if self.params.perturbation_work == PerturbationWork::Include {
            self.work.accumulate(before, after)?;
        }
        self.work.record_perturbation(after - before);
        debug!(
            "Applied {} move at lambda = {:.4}: dU = {:.6} kJ/mol",
            self.mover.name(),
            context.coupling(),
            after - before
        );
        Ok(delta)
    }

    fn restore<C>(&mut self, context: &mut C, snapshot: &Configuration) -> Result<(), NcmcError>
    where
        C: SimulationContext + ?Sized,
    {
        let restored = context
            .restore(snapshot)
            .and_then(|_| context.set_coupling(self.schedule.start()));
        if let Err(source) = restored {
            self.transition(EngineState::Idle);
            return Err(NcmcError::RestoreFailed(source));
        }
        Ok(())
    }

    fn report(&mut self, report: StepReport) {
        for reporter in self.reporters.iter_mut() {
            if reporter.wants(report.step) {
                if let Err(e) = reporter.report(&report) {
                    warn!("Reporter failed at step {}: {}", report.step, e);
                }
            }
        }
    }
}

fn checked_energy<C>(context: &mut C, phase: &'static str) -> Result<f64, NcmcError>
where
    C: SimulationContext + ?Sized,
{
    let energy = context
        .potential_energy()
        .map_err(|source| NcmcError::IntegratorFailure { phase, source })?;
    if !energy.is_finite() {
        return Err(NcmcError::IntegratorFailure {
            phase,
            source: ContextError::NonFiniteEnergy(energy),
        });
    }
    Ok(energy)
}
