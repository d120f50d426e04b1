//! Simulation settings loaded from JSON

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::context::langevin::LangevinParams;
use crate::context::thermal_energy;
use crate::forcefield::alchemical::AlchemicalFunctions;
use crate::forcefield::softcore::SoftCoreParams;
use crate::moves::{
    Move, ProposalError, ProposalParameters, RigidBodyMove, RotationMove, TranslationMove,
    WeightedMoves,
};
use crate::ncmc::engine::{EngineParams, PerturbationWork};
use crate::ncmc::schedule::{Direction, ScheduleError, SwitchingSchedule};

/// Errors that can occur while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Invalid switching schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Invalid move: {0}")]
    Move(#[from] ProposalError),

    #[error("Invalid particle selection '{0}', expected start:end")]
    Selection(String),
}

/// Move types that can be requested from a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Translation,
    Rotation,
    RigidBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveConfig {
    pub kind: MoveKind,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Full set of simulation settings; missing fields take their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Movable subsystem as `start:end` (half-open, zero-based)
    pub ligand: Option<String>,

    /// Number of NCMC iterations
    pub iterations: usize,

    /// λ steps per NCMC cycle
    pub ncmc_steps: usize,

    /// Explicit λ values; overrides `ncmc_steps` when present
    pub lambda_values: Option<Vec<f64>>,

    pub direction: Direction,

    /// Integrator steps after every λ change
    pub propagation_steps: usize,

    /// Conventional MD steps between NCMC cycles
    pub md_steps: usize,

    pub perturbation_work: PerturbationWork,
    pub seed: u64,

    /// Steps between state-data reports; 0 disables them
    pub report_interval: usize,

    pub integrator: LangevinParams,
    pub forcefield: SoftCoreParams,
    pub alchemical: AlchemicalFunctions,
    pub proposal: ProposalParameters,
    pub moves: Vec<MoveConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ligand: None,
            iterations: 10,
            ncmc_steps: 100,
            lambda_values: None,
            direction: Direction::Forward,
            propagation_steps: 1,
            md_steps: 500,
            perturbation_work: PerturbationWork::Include,
            seed: 42,
            report_interval: 0,
            integrator: LangevinParams::default(),
            forcefield: SoftCoreParams::default(),
            alchemical: AlchemicalFunctions::default(),
            proposal: ProposalParameters::default(),
            moves: vec![MoveConfig {
                kind: MoveKind::RigidBody,
                weight: 1.0,
            }],
        }
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

impl SimulationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine or integrator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let integrator = &self.integrator;
        if !(integrator.temperature.is_finite() && integrator.temperature > 0.0) {
            return Err(invalid("integrator.temperature", "must be positive"));
        }
        if !(integrator.timestep.is_finite() && integrator.timestep > 0.0) {
            return Err(invalid("integrator.timestep", "must be positive"));
        }
        if !(integrator.friction.is_finite() && integrator.friction >= 0.0) {
            return Err(invalid("integrator.friction", "must be non-negative"));
        }
        if !(self.forcefield.cutoff.is_finite() && self.forcefield.cutoff > 0.0) {
            return Err(invalid("forcefield.cutoff", "must be positive"));
        }
        if !(self.forcefield.alpha.is_finite() && self.forcefield.alpha >= 0.0) {
            return Err(invalid("forcefield.alpha", "must be non-negative"));
        }
        if !(self.alchemical.steric_width > 0.0 && self.alchemical.steric_width <= 0.5) {
            return Err(invalid("alchemical.steric_width", "must lie in (0, 0.5]"));
        }
        if !(self.alchemical.electrostatic_window > 0.0
            && self.alchemical.electrostatic_window <= 0.5)
        {
            return Err(invalid(
                "alchemical.electrostatic_window",
                "must lie in (0, 0.5]",
            ));
        }
        if self.moves.is_empty() {
            return Err(invalid("moves", "at least one move is required"));
        }
        if let Some(ligand) = &self.ligand {
            parse_selection(ligand)?;
        }
        self.schedule()?;
        Ok(())
    }

    pub fn kt(&self) -> f64 {
        thermal_energy(self.integrator.temperature)
    }

    pub fn schedule(&self) -> Result<SwitchingSchedule, ConfigError> {
        match &self.lambda_values {
            Some(values) => Ok(SwitchingSchedule::from_values(
                values.clone(),
                self.direction,
            )?),
            None => Ok(SwitchingSchedule::new(self.ncmc_steps, self.direction)),
        }
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            kt: self.kt(),
            propagation_steps: self.propagation_steps,
            perturbation_work: self.perturbation_work,
        }
    }

    /// Build the configured move over `indices`; `masses` covers all particles
    pub fn build_move(&self, indices: &[usize], masses: &[f64]) -> Result<Box<dyn Move>, ConfigError> {
        let mut entries: Vec<(Box<dyn Move>, f64)> = Vec::with_capacity(self.moves.len());
        for entry in &self.moves {
            entries.push((self.single_move(entry.kind, indices, masses)?, entry.weight));
        }

        if entries.len() == 1 {
            let (mover, _) = entries.remove(0);
            return Ok(mover);
        }
        Ok(Box::new(WeightedMoves::new(entries)?))
    }

    fn single_move(
        &self,
        kind: MoveKind,
        indices: &[usize],
        masses: &[f64],
    ) -> Result<Box<dyn Move>, ConfigError> {
        let params = self.proposal.clone();
        let mover: Box<dyn Move> = match kind {
            MoveKind::Translation => Box::new(TranslationMove::new(indices.to_vec(), params)?),
            MoveKind::Rotation => Box::new(RotationMove::new(
                indices.to_vec(),
                masses.to_vec(),
                params,
            )?),
            MoveKind::RigidBody => Box::new(RigidBodyMove::new(
                indices.to_vec(),
                masses.to_vec(),
                params,
            )?),
        };
        Ok(mover)
    }
}

/// Parse a half-open `start:end` particle range
pub fn parse_selection(selection: &str) -> Result<Vec<usize>, ConfigError> {
    let err = || ConfigError::Selection(selection.to_string());
    let (start, end) = selection.split_once(':').ok_or_else(err)?;
    let start: usize = start.trim().parse().map_err(|_| err())?;
    let end: usize = end.trim().parse().map_err(|_| err())?;
    if end <= start {
        return Err(err());
    }
    Ok((start..end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.schedule().unwrap().steps(), 100);
        assert_eq!(config.perturbation_work, PerturbationWork::Include);
        assert!((config.kt() - 2.494_338_785_4).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimulationConfig::from_json_str(
            r#"{
                "ligand": "2:5",
                "ncmc_steps": 20,
                "direction": "backward",
                "perturbation_work": "exclude",
                "integrator": { "temperature": 310.0 },
                "moves": [ { "kind": "translation", "weight": 1.0 }, { "kind": "rotation" } ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.ncmc_steps, 20);
        assert_eq!(config.direction, Direction::Backward);
        assert_eq!(config.perturbation_work, PerturbationWork::Exclude);
        assert_eq!(config.integrator.temperature, 310.0);
        assert_eq!(config.integrator.timestep, 0.002);
        assert_eq!(config.moves[1].weight, 1.0);
        assert_eq!(config.md_steps, 500);
        config.validate().unwrap();

        let schedule = config.schedule().unwrap();
        assert_eq!(schedule.start(), 1.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "iterations": 3, "seed": 7 }}"#).unwrap();

        let config = SimulationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SimulationConfig::default();
        config.integrator.temperature = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "integrator.temperature",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.lambda_values = Some(vec![0.0, 0.6, 0.4, 1.0]);
        assert!(matches!(config.validate(), Err(ConfigError::Schedule(_))));

        let mut config = SimulationConfig::default();
        config.moves.clear();
        assert!(config.validate().is_err());

        assert!(SimulationConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_build_moves() {
        let masses = vec![12.0; 6];
        let mut config = SimulationConfig::default();
        let single = config.build_move(&[3, 4, 5], &masses).unwrap();
        assert_eq!(single.name(), "rigid-body");

        config.moves.push(MoveConfig {
            kind: MoveKind::Translation,
            weight: 3.0,
        });
        let weighted = config.build_move(&[3, 4, 5], &masses).unwrap();
        assert_eq!(weighted.name(), "weighted");
        assert_eq!(weighted.atom_indices(), &[3, 4, 5]);
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("2:5").unwrap(), vec![2, 3, 4]);
        assert!(parse_selection("5:2").is_err());
        assert!(parse_selection("abc").is_err());
        assert!(parse_selection("1:x").is_err());
    }
}
