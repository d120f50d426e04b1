//! Candidate structural moves for a movable subsystem
//!
//! A move draws a rigid-body [`MoveDelta`] (rotation about a pivot followed
//! by a translation) for the particles it owns. Every delta has an exact
//! inverse, so any move can be undone without a stored copy of positions.

use nalgebra::{UnitQuaternion, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::{Cell, Configuration, ConfigurationError};
use crate::math::{bounded_random_rotation, random_translation, uniform_random_rotation};

/// Errors that can occur while proposing a move
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProposalError {
    #[error("Particle {particle} would leave the simulation cell")]
    OutsideCell { particle: usize },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid move parameters: {0}")]
    InvalidParameters(String),
}

/// Bounds on a candidate move; fixed once the move is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalParameters {
    /// Maximum displacement per axis (nm)
    pub max_translation: f64,

    /// Maximum rotation angle (radians); `None` draws uniformly from SO(3)
    pub max_rotation: Option<f64>,

    /// Region the moved particles must stay inside
    pub cell: Option<Cell>,
}

impl Default for ProposalParameters {
    fn default() -> Self {
        Self {
            max_translation: 0.5,
            max_rotation: None,
            cell: None,
        }
    }
}

impl ProposalParameters {
    fn validate(&self) -> Result<(), ProposalError> {
        if !self.max_translation.is_finite() || self.max_translation < 0.0 {
            return Err(ProposalError::InvalidParameters(format!(
                "max_translation must be finite and non-negative, got {}",
                self.max_translation
            )));
        }
        if let Some(angle) = self.max_rotation {
            if !angle.is_finite() || angle < 0.0 {
                return Err(ProposalError::InvalidParameters(format!(
                    "max_rotation must be finite and non-negative, got {}",
                    angle
                )));
            }
        }
        Ok(())
    }
}

/// A rigid-body displacement: `x' = rotation * (x - pivot) + pivot + translation`
#[derive(Debug, Clone, PartialEq)]
pub struct MoveDelta {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub pivot: Vector3<f64>,
}

impl MoveDelta {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            pivot: Vector3::zeros(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.translation == Vector3::zeros() && self.rotation == UnitQuaternion::identity()
    }

    /// The delta that undoes this one
    pub fn inverse(&self) -> Self {
        Self {
            translation: -self.translation,
            rotation: self.rotation.inverse(),
            pivot: self.pivot + self.translation,
        }
    }

    /// Apply the delta to the selected particles of `configuration`
    pub fn apply(
        &self,
        configuration: &mut Configuration,
        indices: &[usize],
    ) -> Result<(), ConfigurationError> {
        configuration.apply_rigid_body(indices, &self.rotation, &self.pivot, &self.translation)
    }
}

/// Trait for move types usable by the NCMC engine.
///
/// Implementors only generate deltas; the default `propose` enforces the
/// cell constraint so every move type rejects cell escapes the same way.
pub trait Move: Send + Sync {
    fn name(&self) -> &'static str;

    /// Particles the move displaces
    fn atom_indices(&self) -> &[usize];

    fn parameters(&self) -> &ProposalParameters;

    /// Draw a candidate delta for the current configuration
    fn generate(
        &self,
        configuration: &Configuration,
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError>;

    /// Draw a delta and check it against the hard geometric constraints
    fn propose(
        &self,
        configuration: &Configuration,
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        let delta = self.generate(configuration, rng)?;
        if let Some(cell) = &self.parameters().cell {
            let mut candidate = configuration.clone();
            delta.apply(&mut candidate, self.atom_indices())?;
            if let Some(&particle) = self
                .atom_indices()
                .iter()
                .find(|&&i| !cell.contains(&candidate.positions[i]))
            {
                return Err(ProposalError::OutsideCell { particle });
            }
        }
        Ok(delta)
    }

    /// Delta reversing `delta`
    fn inverse(&self, delta: &MoveDelta) -> MoveDelta {
        delta.inverse()
    }
}

fn check_indices(indices: &[usize]) -> Result<(), ProposalError> {
    if indices.is_empty() {
        return Err(ConfigurationError::EmptySelection.into());
    }
    Ok(())
}

/// Uniform random displacement of the subsystem
#[derive(Debug, Clone)]
pub struct TranslationMove {
    indices: Vec<usize>,
    params: ProposalParameters,
}

impl TranslationMove {
    pub fn new(indices: Vec<usize>, params: ProposalParameters) -> Result<Self, ProposalError> {
        check_indices(&indices)?;
        params.validate()?;
        Ok(Self { indices, params })
    }
}

impl Move for TranslationMove {
    fn name(&self) -> &'static str {
        "translation"
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
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        Ok(MoveDelta {
            translation: random_translation(rng, self.params.max_translation),
            rotation: UnitQuaternion::identity(),
            pivot: configuration.centroid(&self.indices)?,
        })
    }
}

/// Random rotation of the subsystem about its center of mass
#[derive(Debug, Clone)]
pub struct RotationMove {
    indices: Vec<usize>,
    masses: Vec<f64>,
    params: ProposalParameters,
}

impl RotationMove {
    /// `masses` holds one entry per particle of the whole system
    pub fn new(
        indices: Vec<usize>,
        masses: Vec<f64>,
        params: ProposalParameters,
    ) -> Result<Self, ProposalError> {
        check_indices(&indices)?;
        params.validate()?;
        Ok(Self {
            indices,
            masses,
            params,
        })
    }
}

fn draw_rotation(rng: &mut dyn RngCore, max_rotation: Option<f64>) -> UnitQuaternion<f64> {
    match max_rotation {
        Some(angle) => bounded_random_rotation(rng, angle),
        None => uniform_random_rotation(rng),
    }
}

impl Move for RotationMove {
    fn name(&self) -> &'static str {
        "rotation"
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
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        Ok(MoveDelta {
            translation: Vector3::zeros(),
            rotation: draw_rotation(rng, self.params.max_rotation),
            pivot: configuration.center_of_mass(&self.indices, &self.masses)?,
        })
    }
}

/// Rotation about the center of mass followed by a translation
#[derive(Debug, Clone)]
pub struct RigidBodyMove {
    indices: Vec<usize>,
    masses: Vec<f64>,
    params: ProposalParameters,
}

impl RigidBodyMove {
    pub fn new(
        indices: Vec<usize>,
        masses: Vec<f64>,
        params: ProposalParameters,
    ) -> Result<Self, ProposalError> {
        check_indices(&indices)?;
        params.validate()?;
        Ok(Self {
            indices,
            masses,
            params,
        })
    }
}

impl Move for RigidBodyMove {
    fn name(&self) -> &'static str {
        "rigid-body"
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
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        let rotation = draw_rotation(rng, self.params.max_rotation);
        let translation = random_translation(rng, self.params.max_translation);
        Ok(MoveDelta {
            translation,
            rotation,
            pivot: configuration.center_of_mass(&self.indices, &self.masses)?,
        })
    }
}

/// Picks one of several moves over the same subsystem with fixed probabilities
pub struct WeightedMoves {
    moves: Vec<Box<dyn Move>>,
    cumulative: Vec<f64>,
    params: ProposalParameters,
}

impl WeightedMoves {
    /// Weights are normalized; all moves must displace the same particles
    pub fn new(entries: Vec<(Box<dyn Move>, f64)>) -> Result<Self, ProposalError> {
        let first = match entries.first() {
            Some((mover, _)) => mover.atom_indices().to_vec(),
            None => {
                return Err(ProposalError::InvalidParameters(
                    "at least one move is required".to_string(),
                ))
            }
        };
        if entries.iter().any(|(m, _)| m.atom_indices() != first.as_slice()) {
            return Err(ProposalError::InvalidParameters(
                "weighted moves must share the same particles".to_string(),
            ));
        }
        if entries.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(ProposalError::InvalidParameters(
                "move weights must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(ProposalError::InvalidParameters(
                "move weights sum to zero".to_string(),
            ));
        }

        let mut running = 0.0;
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut moves = Vec::with_capacity(entries.len());
        for (mover, weight) in entries {
            running += weight / total;
            cumulative.push(running);
            moves.push(mover);
        }
        let params = moves[0].parameters().clone();

        Ok(Self {
            moves,
            cumulative,
            params,
        })
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    fn select(&self, rng: &mut dyn RngCore) -> &dyn Move {
        let u: f64 = rng.gen();
        let index = self
            .cumulative
            .iter()
            .position(|&c| u < c)
            .unwrap_or(self.moves.len() - 1);
        self.moves[index].as_ref()
    }
}

impl Move for WeightedMoves {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn atom_indices(&self) -> &[usize] {
        self.moves[0].atom_indices()
    }

    fn parameters(&self) -> &ProposalParameters {
        &self.params
    }

    fn generate(
        &self,
        configuration: &Configuration,
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        self.select(rng).generate(configuration, rng)
    }

    fn propose(
        &self,
        configuration: &Configuration,
        rng: &mut dyn RngCore,
    ) -> Result<MoveDelta, ProposalError> {
        self.select(rng).propose(configuration, rng)
    }
}
