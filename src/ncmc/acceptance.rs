//! Work-corrected Metropolis acceptance

use crate::ncmc::NcmcError;

/// Below this log-probability `exp` underflows past the smallest subnormal f64
const MIN_LOG_PROBABILITY: f64 = -745.2;

/// Acceptance probability `min(1, exp(-work / kt))`.
///
/// Returns exactly 1 for `work <= 0` without evaluating the exponential and
/// exactly 0 once the exponent underflows. NaN work is never accepted.
pub fn acceptance_probability(work: f64, kt: f64) -> f64 {
    if work.is_nan() {
        return 0.0;
    }
    if work <= 0.0 {
        return 1.0;
    }
    let log_probability = -work / kt;
    if log_probability < MIN_LOG_PROBABILITY {
        return 0.0;
    }
    log_probability.exp().min(1.0)
}

/// Accept when the uniform draw falls below the acceptance probability
pub fn decide(work: f64, kt: f64, uniform: f64) -> bool {
    uniform < acceptance_probability(work, kt)
}

/// Acceptance test bound to a fixed thermal energy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceTest {
    kt: f64,
}

impl AcceptanceTest {
    /// `kt` is the thermal energy in the same units as the work
    pub fn new(kt: f64) -> Result<Self, NcmcError> {
        if !kt.is_finite() || kt <= 0.0 {
            return Err(NcmcError::InvalidParameters(format!(
                "kT must be positive and finite, got {}",
                kt
            )));
        }
        Ok(Self { kt })
    }

    pub fn kt(&self) -> f64 {
        self.kt
    }

    pub fn probability(&self, work: f64) -> f64 {
        acceptance_probability(work, self.kt)
    }

    pub fn decide(&self, work: f64, uniform: f64) -> bool {
        decide(work, self.kt, uniform)
    }
}
