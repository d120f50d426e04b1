//! Simulation contexts: the integrator/force-evaluator seam used by the NCMC engine

pub mod langevin;

use nalgebra::Vector3;
use thiserror::Error;

use crate::configuration::{Configuration, ConfigurationError};
use crate::forcefield::ForceFieldError;

/// Boltzmann constant in kJ mol^-1 K^-1
pub const BOLTZMANN: f64 = 0.008314462618;

/// Thermal energy kT in kJ/mol at `temperature` kelvin
pub fn thermal_energy(temperature: f64) -> f64 {
    BOLTZMANN * temperature
}

/// Errors raised by a simulation context
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("Non-finite potential energy: {0}")]
    NonFiniteEnergy(f64),

    #[error("Non-finite force on particle {0}")]
    NonFiniteForce(usize),

    #[error("Coupling parameter out of range: {0}")]
    InvalidCoupling(f64),

    #[error("ForceField error: {0}")]
    ForceField(#[from] ForceFieldError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Integrator error: {0}")]
    Integrator(String),
}

/// The contract the NCMC engine needs from an MD integrator and force evaluator.
///
/// Every call is blocking. Implementations may parallelize internally but
/// must return results in program order.
pub trait SimulationContext {
    /// Set the protocol coupling parameter λ in [0, 1]
    fn set_coupling(&mut self, lambda: f64) -> Result<(), ContextError>;

    /// Current protocol coupling parameter
    fn coupling(&self) -> f64;

    /// Potential energy (kJ/mol) at the current positions and coupling
    fn potential_energy(&mut self) -> Result<f64, ContextError>;

    /// Advance dynamics by one integrator step
    fn step(&mut self) -> Result<(), ContextError>;

    /// Advance dynamics by `n` integrator steps
    fn advance(&mut self, n: usize) -> Result<(), ContextError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    fn positions(&self) -> &[Vector3<f64>];

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), ContextError>;

    /// Copy of the full dynamical state
    fn state(&self) -> Configuration;

    /// Replace the full dynamical state with `state`
    fn restore(&mut self, state: &Configuration) -> Result<(), ContextError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_thermal_energy_at_room_temperature() {
        assert_approx_eq!(thermal_energy(300.0), 2.494338785, 1e-9);
    }
}
