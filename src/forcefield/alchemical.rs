//! Mapping from the protocol parameter λ to interaction scaling factors
//!
//! Interactions between the movable subsystem and its environment are at
//! full strength at both termini (λ = 0 and λ = 1) and switched off around
//! the midpoint, where the structural move is applied. Electrostatics are
//! removed first and restored last; sterics fade linearly towards λ = 0.5.

use serde::{Deserialize, Serialize};

use super::PairScaling;

/// Piecewise-linear alchemical switching functions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlchemicalFunctions {
    /// Distance in λ from the midpoint at which sterics reach full strength
    pub steric_width: f64,

    /// Width in λ of each electrostatic switching window at the termini
    pub electrostatic_window: f64,
}

impl Default for AlchemicalFunctions {
    fn default() -> Self {
        Self {
            steric_width: 0.3,
            electrostatic_window: 0.2,
        }
    }
}

impl AlchemicalFunctions {
    /// Steric scaling: `min(1, |λ - 0.5| / steric_width)`
    pub fn sterics(&self, lambda: f64) -> f64 {
        ((lambda - 0.5).abs() / self.steric_width).min(1.0)
    }

    /// Electrostatic scaling: linear off in `[0, w]`, zero in between, linear on in `[1 - w, 1]`
    pub fn electrostatics(&self, lambda: f64) -> f64 {
        let w = self.electrostatic_window;
        if lambda < w {
            1.0 - lambda / w
        } else if lambda > 1.0 - w {
            (lambda - (1.0 - w)) / w
        } else {
            0.0
        }
    }

    pub fn scaling(&self, lambda: f64) -> PairScaling {
        PairScaling {
            sterics: self.sterics(lambda),
            electrostatics: self.electrostatics(lambda),
        }
    }
}
