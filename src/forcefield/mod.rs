//! Forcefield implementations for nonbonded interactions under alchemical scaling

pub mod alchemical;
pub mod softcore;

use crate::particle::Particle;
use thiserror::Error;

/// Errors that can occur in forcefields
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForceFieldError {
    #[error("Invalid pair distance: {0}")]
    InvalidDistance(f64),

    #[error("Non-finite {term} energy at r = {distance}")]
    NonFinite { term: &'static str, distance: f64 },
}

/// Scaling factors applied to one particle pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScaling {
    pub sterics: f64,
    pub electrostatics: f64,
}

impl PairScaling {
    /// Unscaled interactions
    pub const FULL: PairScaling = PairScaling {
        sterics: 1.0,
        electrostatics: 1.0,
    };
}

/// Trait representing a pairwise nonbonded forcefield.
///
/// Every term returns `(energy, dU/dr)`. The Send + Sync bounds enable
/// parallel force evaluation with rayon.
pub trait ForceField: Send + Sync {
    /// Get the name of the forcefield
    fn name(&self) -> &'static str;

    /// Pairs farther apart than this (nm) do not interact
    fn cutoff(&self) -> f64;

    /// Lennard-Jones term with steric scaling `sterics` in [0, 1]
    fn lennard_jones(
        &self,
        a: &Particle,
        b: &Particle,
        distance: f64,
        sterics: f64,
    ) -> Result<(f64, f64), ForceFieldError>;

    /// Coulomb term with electrostatic scaling `electrostatics` in [0, 1]
    fn electrostatic(
        &self,
        a: &Particle,
        b: &Particle,
        distance: f64,
        electrostatics: f64,
    ) -> Result<(f64, f64), ForceFieldError>;

    /// Total pair interaction; zero beyond the cutoff
    fn pair(
        &self,
        a: &Particle,
        b: &Particle,
        distance: f64,
        scaling: PairScaling,
    ) -> Result<(f64, f64), ForceFieldError> {
        if distance > self.cutoff() {
            return Ok((0.0, 0.0));
        }
        let (lj, dlj) = self.lennard_jones(a, b, distance, scaling.sterics)?;
        let (coul, dcoul) = self.electrostatic(a, b, distance, scaling.electrostatics)?;
        Ok((lj + coul, dlj + dcoul))
    }
}
