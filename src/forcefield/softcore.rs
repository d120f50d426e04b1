//! Soft-core Lennard-Jones plus cutoff Coulomb forcefield

use serde::{Deserialize, Serialize};

use crate::forcefield::{ForceField, ForceFieldError};
use crate::particle::Particle;

/// Coulomb constant in kJ mol^-1 nm e^-2
pub const COULOMB_CONSTANT: f64 = 138.935458;

/// Parameters for the soft-core forcefield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftCoreParams {
    /// Soft-core alpha; 0 recovers plain Lennard-Jones at every λ
    pub alpha: f64,

    /// Nonbonded cutoff (nm)
    pub cutoff: f64,
}

impl Default for SoftCoreParams {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            cutoff: 1.0,
        }
    }
}

/// Beutler soft-core Lennard-Jones with linearly scaled Coulomb
#[derive(Debug, Clone, Default)]
pub struct SoftCoreForceField {
    pub params: SoftCoreParams,
}

impl SoftCoreForceField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SoftCoreParams) -> Self {
        Self { params }
    }

    /// Lorentz-Berthelot combining rules
    fn combine(a: &Particle, b: &Particle) -> (f64, f64) {
        (0.5 * (a.sigma + b.sigma), (a.epsilon * b.epsilon).sqrt())
    }
}

impl ForceField for SoftCoreForceField {
    fn name(&self) -> &'static str {
        "SoftCore"
    }

    fn cutoff(&self) -> f64 {
        self.params.cutoff
    }

    fn lennard_jones(
        &self,
        a: &Particle,
        b: &Particle,
        distance: f64,
        sterics: f64,
    ) -> Result<(f64, f64), ForceFieldError> {
        if !(distance > 0.0) {
            return Err(ForceFieldError::InvalidDistance(distance));
        }
        if sterics == 0.0 {
            return Ok((0.0, 0.0));
        }

        let (sigma, epsilon) = Self::combine(a, b);
        if sigma == 0.0 || epsilon == 0.0 {
            return Ok((0.0, 0.0));
        }

        // U = 4 eps λ [1/d^2 - 1/d],  d = alpha (1 - λ) + (r/sigma)^6
        let s = (distance / sigma).powi(6);
        let d = self.params.alpha * (1.0 - sterics) + s;
        let energy = 4.0 * epsilon * sterics * (1.0 / (d * d) - 1.0 / d);
        let ds_dr = 6.0 * s / distance;
        let derivative = 4.0 * epsilon * sterics * (-2.0 / (d * d * d) + 1.0 / (d * d)) * ds_dr;

        if !energy.is_finite() || !derivative.is_finite() {
            return Err(ForceFieldError::NonFinite {
                term: "Lennard-Jones",
                distance,
            });
        }
        Ok((energy, derivative))
    }

    fn electrostatic(
        &self,
        a: &Particle,
        b: &Particle,
        distance: f64,
        electrostatics: f64,
    ) -> Result<(f64, f64), ForceFieldError> {
        if !(distance > 0.0) {
            return Err(ForceFieldError::InvalidDistance(distance));
        }
        if electrostatics == 0.0 || a.charge == 0.0 || b.charge == 0.0 {
            return Ok((0.0, 0.0));
        }

        let energy = electrostatics * COULOMB_CONSTANT * a.charge * b.charge / distance;
        if !energy.is_finite() {
            return Err(ForceFieldError::NonFinite {
                term: "Coulomb",
                distance,
            });
        }
        Ok((energy, -energy / distance))
    }
}
