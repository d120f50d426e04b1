//! Nonequilibrium work accounting for a single NCMC cycle

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while accumulating work
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkError {
    #[error("Non-finite energies (before = {before}, after = {after})")]
    NonFinite { before: f64, after: f64 },

    #[error("Cumulative work overflowed to {0}")]
    Overflow(f64),
}

/// Work collected over one cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkRecord {
    /// Per-step increments in the order they were accumulated
    pub increments: Vec<f64>,

    /// Running sum of `increments`
    pub total: f64,

    /// Energy change caused by the structural move itself
    pub perturbation_energy: Option<f64>,
}

/// Sequential work accumulator.
///
/// Increments are summed strictly in arrival order, so identical inputs
/// always reproduce bit-identical totals.
#[derive(Debug, Clone, Default)]
pub struct WorkAccumulator {
    total: f64,
    increments: Vec<f64>,
    perturbation_energy: Option<f64>,
}

impl WorkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(steps: usize) -> Self {
        Self {
            increments: Vec::with_capacity(steps),
            ..Self::default()
        }
    }

    /// Reset to zero work for a new cycle
    pub fn begin_cycle(&mut self) {
        self.total = 0.0;
        self.increments.clear();
        self.perturbation_energy = None;
    }

    /// Add `after - before` to the running total; returns the increment
    pub fn accumulate(&mut self, before: f64, after: f64) -> Result<f64, WorkError> {
        if !before.is_finite() || !after.is_finite() {
            return Err(WorkError::NonFinite { before, after });
        }
        let delta = after - before;
        let total = self.total + delta;
        if !delta.is_finite() || !total.is_finite() {
            return Err(WorkError::Overflow(total));
        }

        self.increments.push(delta);
        self.total = total;
        Ok(delta)
    }

    /// Record the energy change of the structural move without adding it to the work
    pub fn record_perturbation(&mut self, delta: f64) {
        self.perturbation_energy = Some(delta);
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn increments(&self) -> &[f64] {
        &self.increments
    }

    pub fn perturbation_energy(&self) -> Option<f64> {
        self.perturbation_energy
    }

    /// Snapshot of the current cycle's work
    pub fn record(&self) -> WorkRecord {
        WorkRecord {
            increments: self.increments.clone(),
            total: self.total,
            perturbation_energy: self.perturbation_energy,
        }
    }
}
