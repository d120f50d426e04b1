//! Shared fixtures for integration tests

#![allow(dead_code)]

use blues::configuration::Configuration;
use blues::context::{ContextError, SimulationContext};
use blues::moves::{Move, MoveDelta, ProposalError, ProposalParameters};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

pub fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

/// One particle with two states: A at x = 0 (energy 0) and B at x = 1
/// (energy `delta_e`). The environment coupling is `|1 - 2λ|`.
///
/// `step()` jiggles the y coordinate so restoration is observable, and
/// `nan_on_call` makes the n-th energy evaluation return NaN.
pub struct TwoStateContext {
    pub positions: Vec<Vector3<f64>>,
    pub lambda: f64,
    pub delta_e: f64,
    pub energy_calls: usize,
    pub nan_on_call: Option<usize>,
    pub steps: usize,
}

impl TwoStateContext {
    pub fn new(delta_e: f64) -> Self {
        Self {
            positions: vec![Vector3::zeros()],
            lambda: 0.0,
            delta_e,
            energy_calls: 0,
            nan_on_call: None,
            steps: 0,
        }
    }

    pub fn in_state_a(&self) -> bool {
        self.positions[0].x < 0.5
    }
}

impl SimulationContext for TwoStateContext {
    fn set_coupling(&mut self, lambda: f64) -> Result<(), ContextError> {
        if !(0.0..=1.0).contains(&lambda) {
            return Err(ContextError::InvalidCoupling(lambda));
        }
        self.lambda = lambda;
        Ok(())
    }

    fn coupling(&self) -> f64 {
        self.lambda
    }

    fn potential_energy(&mut self) -> Result<f64, ContextError> {
        self.energy_calls += 1;
        if self.nan_on_call == Some(self.energy_calls) {
            return Ok(f64::NAN);
        }
        let state_energy = if self.in_state_a() { 0.0 } else { self.delta_e };
        Ok((1.0 - 2.0 * self.lambda).abs() * state_energy)
    }

    fn step(&mut self) -> Result<(), ContextError> {
        self.steps += 1;
        self.positions[0].y += 0.125;
        Ok(())
    }

    fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), ContextError> {
        self.positions = positions.to_vec();
        Ok(())
    }

    fn state(&self) -> Configuration {
        Configuration::new(self.positions.clone())
    }

    fn restore(&mut self, state: &Configuration) -> Result<(), ContextError> {
        self.positions = state.positions.clone();
        Ok(())
    }
}

/// Deterministic move between the two states of [`TwoStateContext`]
pub struct ToggleMove {
    indices: Vec<usize>,
    params: ProposalParameters,
}

impl ToggleMove {
    pub fn new(params: ProposalParameters) -> Self {
        Self {
            indices: vec![0],
            params,
        }
    }
}

impl Move for ToggleMove {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn atom_indices(&self) -> &[usize] {
        &self.indices
    }

    fn parameters(&self) -> &ProposalParameters {
        &self.params
    }

    fn generate(
        &self,
        configuration: &Configuration,
        _rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        let x = configuration.positions[0].x;
        let dx = if x < 0.5 { 1.0 } else { -1.0 };
        Ok(MoveDelta {
            translation: Vector3::new(dx, 0.0, 0.0),
            ..MoveDelta::identity()
        })
    }
}

/// Random source that counts every call made on it
pub struct CountingRng {
    inner: StdRng,
    pub calls: usize,
}

impl CountingRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            calls: 0,
        }
    }
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.calls += 1;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.calls += 1;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.calls += 1;
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.calls += 1;
        self.inner.try_fill_bytes(dest)
    }
}
