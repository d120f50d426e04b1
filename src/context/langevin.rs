//! Reference Langevin dynamics context over a pairwise forcefield

use log::debug;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::configuration::{Configuration, ConfigurationError};
use crate::context::{thermal_energy, ContextError, SimulationContext};
use crate::forcefield::alchemical::AlchemicalFunctions;
use crate::forcefield::{ForceField, PairScaling};
use crate::math::minimum_image;
use crate::particle::Particle;

/// Parameters for the Langevin integrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LangevinParams {
    /// Integration timestep (ps)
    pub timestep: f64,

    /// Collision rate (1/ps)
    pub friction: f64,

    /// Bath temperature (K)
    pub temperature: f64,
}

impl Default for LangevinParams {
    fn default() -> Self {
        Self {
            timestep: 0.002,
            friction: 1.0,
            temperature: 300.0,
        }
    }
}

/// BAOAB Langevin integrator with alchemically coupled subsystem.
///
/// Pairs with exactly one particle in the alchemical subsystem are scaled by
/// the alchemical functions at the current λ; all other pairs interact fully.
pub struct LangevinContext<F: ForceField> {
    particles: Vec<Particle>,
    masses: Vec<f64>,
    alchemical: Vec<bool>,
    forcefield: F,
    functions: AlchemicalFunctions,
    params: LangevinParams,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
    periodic_box: Option<Vector3<f64>>,
    lambda: f64,
    rng: StdRng,
    cache: Option<(f64, Vec<Vector3<f64>>)>,
    steps_taken: u64,
}

impl<F: ForceField> LangevinContext<F> {
    /// Create a context; velocities come from `configuration` or are drawn
    /// from the Maxwell-Boltzmann distribution at the bath temperature.
    pub fn new(
        particles: Vec<Particle>,
        configuration: Configuration,
        alchemical_indices: &[usize],
        forcefield: F,
        params: LangevinParams,
        seed: u64,
    ) -> Result<Self, ContextError> {
        let n = particles.len();
        if configuration.len() != n {
            return Err(ConfigurationError::LengthMismatch {
                expected: n,
                actual: configuration.len(),
            }
            .into());
        }
        let mut alchemical = vec![false; n];
        for &i in alchemical_indices {
            if i >= n {
                return Err(ConfigurationError::InvalidIndex(i).into());
            }
            alchemical[i] = true;
        }
        if !(params.timestep > 0.0) || params.friction < 0.0 || !(params.temperature > 0.0) {
            return Err(ContextError::Integrator(format!(
                "invalid Langevin parameters: {:?}",
                params
            )));
        }

        let masses: Vec<f64> = particles.iter().map(|p| p.mass).collect();
        let mut context = Self {
            particles,
            masses,
            alchemical,
            forcefield,
            functions: AlchemicalFunctions::default(),
            params,
            positions: configuration.positions,
            velocities: vec![Vector3::zeros(); n],
            periodic_box: configuration.periodic_box,
            lambda: 0.0,
            rng: StdRng::seed_from_u64(seed),
            cache: None,
            steps_taken: 0,
        };

        match configuration.velocities {
            Some(velocities) => context.velocities = velocities,
            None => context.initialize_velocities(),
        }
        Ok(context)
    }

    pub fn with_alchemical_functions(mut self, functions: AlchemicalFunctions) -> Self {
        self.functions = functions;
        self.cache = None;
        self
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn forcefield(&self) -> &F {
        &self.forcefield
    }

    /// Draw velocities from the Maxwell-Boltzmann distribution
    pub fn initialize_velocities(&mut self) {
        let kt = thermal_energy(self.params.temperature);
        for (v, &m) in self.velocities.iter_mut().zip(&self.masses) {
            let sigma = if m > 0.0 { (kt / m).sqrt() } else { 0.0 };
            *v = Vector3::new(
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
            ) * sigma;
        }
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocities
            .iter()
            .zip(&self.masses)
            .map(|(v, &m)| 0.5 * m * v.norm_squared())
            .sum()
    }

    /// Energy and forces at the current positions and λ.
    ///
    /// Per-particle rows are computed in parallel; the energy is summed
    /// sequentially over rows so repeated evaluations are bit-identical.
    fn evaluate(&self) -> Result<(f64, Vec<Vector3<f64>>), ContextError> {
        let n = self.positions.len();
        let coupled = self.functions.scaling(self.lambda);

        let rows = (0..n)
            .into_par_iter()
            .map(|i| -> Result<(f64, Vector3<f64>), ContextError> {
                let mut energy = 0.0;
                let mut force = Vector3::zeros();
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let mut d = self.positions[i] - self.positions[j];
                    if let Some(lengths) = &self.periodic_box {
                        d = minimum_image(d, lengths);
                    }
                    let r = d.norm();
                    let scaling = if self.alchemical[i] != self.alchemical[j] {
                        coupled
                    } else {
                        PairScaling::FULL
                    };
                    let (u, du_dr) =
                        self.forcefield
                            .pair(&self.particles[i], &self.particles[j], r, scaling)?;
                    if j > i {
                        energy += u;
                    }
                    if du_dr != 0.0 {
                        force -= d * (du_dr / r);
                    }
                }
                Ok((energy, force))
            })
            .collect::<Result<Vec<_>, ContextError>>()?;

        let mut total = 0.0;
        let mut forces = Vec::with_capacity(n);
        for (i, (energy, force)) in rows.into_iter().enumerate() {
            if !force.iter().all(|c| c.is_finite()) {
                return Err(ContextError::NonFiniteForce(i));
            }
            total += energy;
            forces.push(force);
        }

        if !total.is_finite() {
            return Err(ContextError::NonFiniteEnergy(total));
        }
        Ok((total, forces))
    }

    fn ensure_evaluated(&mut self) -> Result<(), ContextError> {
        if self.cache.is_none() {
            self.cache = Some(self.evaluate()?);
        }
        Ok(())
    }

    fn half_kick(&mut self) {
        let half_dt = 0.5 * self.params.timestep;
        if let Some((_, forces)) = &self.cache {
            for ((v, f), &m) in self.velocities.iter_mut().zip(forces).zip(&self.masses) {
                if m > 0.0 {
                    *v += f * (half_dt / m);
                }
            }
        }
    }

    fn half_drift(&mut self) {
        let half_dt = 0.5 * self.params.timestep;
        for (x, v) in self.positions.iter_mut().zip(&self.velocities) {
            *x += v * half_dt;
        }
    }

    fn thermostat(&mut self) {
        let kt = thermal_energy(self.params.temperature);
        let c1 = (-self.params.friction * self.params.timestep).exp();
        let c2 = (1.0 - c1 * c1).sqrt();
        for (v, &m) in self.velocities.iter_mut().zip(&self.masses) {
            if m <= 0.0 {
                continue;
            }
            let noise = Vector3::new(
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
                self.rng.sample::<f64, _>(StandardNormal),
            );
            *v = *v * c1 + noise * (c2 * (kt / m).sqrt());
        }
    }
}

impl<F: ForceField> SimulationContext for LangevinContext<F> {
    fn set_coupling(&mut self, lambda: f64) -> Result<(), ContextError> {
        if !(0.0..=1.0).contains(&lambda) {
            return Err(ContextError::InvalidCoupling(lambda));
        }
        if lambda != self.lambda {
            self.lambda = lambda;
            self.cache = None;
        }
        Ok(())
    }

    fn coupling(&self) -> f64 {
        self.lambda
    }

    fn potential_energy(&mut self) -> Result<f64, ContextError> {
        self.ensure_evaluated()?;
        Ok(self.cache.as_ref().map(|(energy, _)| *energy).unwrap_or(0.0))
    }

    fn step(&mut self) -> Result<(), ContextError> {
        self.ensure_evaluated()?;
        self.half_kick();
        self.half_drift();
        self.thermostat();
        self.half_drift();
        self.cache = None;
        self.ensure_evaluated()?;
        self.half_kick();
        self.steps_taken += 1;
        Ok(())
    }

    fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    fn set_positions(&mut self, positions: &[Vector3<f64>]) -> Result<(), ContextError> {
        if positions.len() != self.positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                expected: self.positions.len(),
                actual: positions.len(),
            }
            .into());
        }
        self.positions.copy_from_slice(positions);
        self.cache = None;
        Ok(())
    }

    fn state(&self) -> Configuration {
        Configuration {
            positions: self.positions.clone(),
            velocities: Some(self.velocities.clone()),
            periodic_box: self.periodic_box,
        }
    }

    fn restore(&mut self, state: &Configuration) -> Result<(), ContextError> {
        self.set_positions(&state.positions)?;
        if let Some(velocities) = &state.velocities {
            if velocities.len() != self.velocities.len() {
                return Err(ConfigurationError::LengthMismatch {
                    expected: self.velocities.len(),
                    actual: velocities.len(),
                }
                .into());
            }
            self.velocities.copy_from_slice(velocities);
        }
        self.periodic_box = state.periodic_box;
        debug!("Restored context state ({} particles)", self.positions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::softcore::SoftCoreForceField;
    use crate::particle::Element;
    use assert_approx_eq::assert_approx_eq;

    fn dimer_context(seed: u64) -> LangevinContext<SoftCoreForceField> {
        let particles = vec![
            Particle::new(Element::Argon, "AR1", 0.0),
            Particle::new(Element::Argon, "AR2", 0.0),
            Particle::new(Element::Argon, "LIG", 0.0),
        ];
        let config = Configuration::new(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.38, 0.0, 0.0),
            Vector3::new(0.19, 0.35, 0.0),
        ]);
        LangevinContext::new(
            particles,
            config,
            &[2],
            SoftCoreForceField::new(),
            LangevinParams::default(),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_energy_is_reproducible() {
        let mut a = dimer_context(1);
        let mut b = dimer_context(1);
        assert_eq!(
            a.potential_energy().unwrap().to_bits(),
            b.potential_energy().unwrap().to_bits()
        );
    }

    #[test]
    fn test_decoupling_removes_subsystem_interactions() {
        let mut context = dimer_context(2);
        let full = context.potential_energy().unwrap();

        context.set_coupling(0.5).unwrap();
        let decoupled = context.potential_energy().unwrap();

        let ff = SoftCoreForceField::new();
        let ar = Particle::new(Element::Argon, "AR", 0.0);
        let (pair, _) = ff.pair(&ar, &ar, 0.38, PairScaling::FULL).unwrap();
        assert_approx_eq!(decoupled, pair, 1e-12);
        assert!(full != decoupled);

        context.set_coupling(1.0).unwrap();
        assert_approx_eq!(context.potential_energy().unwrap(), full, 1e-12);
    }

    #[test]
    fn test_forces_match_energy_gradient() {
        let context = dimer_context(3);
        let (_, forces) = context.evaluate().unwrap();
        let h = 1e-6;

        for axis in 0..3 {
            let mut plus = dimer_context(3);
            let mut positions = plus.positions().to_vec();
            positions[2][axis] += h;
            plus.set_positions(&positions).unwrap();

            let mut minus = dimer_context(3);
            positions[2][axis] -= 2.0 * h;
            minus.set_positions(&positions).unwrap();

            let numeric = -(plus.potential_energy().unwrap() - minus.potential_energy().unwrap())
                / (2.0 * h);
            assert_approx_eq!(forces[2][axis], numeric, 1e-3);
        }
    }

    #[test]
    fn test_rejects_out_of_range_coupling() {
        let mut context = dimer_context(4);
        assert_eq!(
            context.set_coupling(1.5),
            Err(ContextError::InvalidCoupling(1.5))
        );
    }

    #[test]
    fn test_restore_is_exact() {
        let mut context = dimer_context(5);
        let snapshot = context.state();
        context.advance(20).unwrap();
        assert_ne!(context.positions(), snapshot.positions.as_slice());

        context.restore(&snapshot).unwrap();
        assert_eq!(context.state(), snapshot);
        assert_eq!(context.steps_taken(), 20);
    }

    #[test]
    fn test_overlapping_particles_report_non_finite_energy() {
        let particles = vec![
            Particle::new(Element::Argon, "A", 0.0),
            Particle::new(Element::Argon, "B", 0.0),
        ];
        let config = Configuration::new(vec![Vector3::zeros(), Vector3::zeros()]);
        let mut context = LangevinContext::new(
            particles,
            config,
            &[],
            SoftCoreForceField::new(),
            LangevinParams::default(),
            0,
        )
        .unwrap();
        assert!(context.potential_energy().is_err());
    }

    #[test]
    fn test_periodic_box_uses_minimum_image() {
        let particles = vec![
            Particle::new(Element::Argon, "A", 0.0),
            Particle::new(Element::Argon, "B", 0.0),
        ];
        let near = Configuration::new(vec![Vector3::zeros(), Vector3::new(0.4, 0.0, 0.0)]);
        let wrapped = Configuration::new(vec![Vector3::zeros(), Vector3::new(2.6, 0.0, 0.0)])
            .with_box(Vector3::new(3.0, 3.0, 3.0));

        let mut a = LangevinContext::new(
            particles.clone(),
            near,
            &[],
            SoftCoreForceField::new(),
            LangevinParams::default(),
            0,
        )
        .unwrap();
        let mut b = LangevinContext::new(
            particles,
            wrapped,
            &[],
            SoftCoreForceField::new(),
            LangevinParams::default(),
            0,
        )
        .unwrap();
        assert_approx_eq!(
            a.potential_energy().unwrap(),
            b.potential_energy().unwrap(),
            1e-12
        );
    }
}
