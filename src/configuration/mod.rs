//! Configuration of a simulated system: positions, velocities and box state

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with configurations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid particle index: {0}")]
    InvalidIndex(usize),

    #[error("Empty particle selection")]
    EmptySelection,

    #[error("Length mismatch: expected {expected} entries, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Axis-aligned region that a movable subsystem must stay inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub center: Vector3<f64>,
    pub size: Vector3<f64>,
}

impl Cell {
    pub fn new(center: Vector3<f64>, size: Vector3<f64>) -> Self {
        Self { center, size }
    }

    /// Check if a point lies inside the cell (boundaries included)
    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        let half_size = self.size * 0.5;
        let min_corner = self.center - half_size;
        let max_corner = self.center + half_size;

        p.x >= min_corner.x
            && p.x <= max_corner.x
            && p.y >= min_corner.y
            && p.y <= max_corner.y
            && p.z >= min_corner.z
            && p.z <= max_corner.z
    }
}

/// Positions (one per particle) plus periodic box and optional velocities.
///
/// Cloning a configuration copies every coordinate; snapshots taken before
/// an NCMC cycle never alias the live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub positions: Vec<Vector3<f64>>,

    /// Velocities (nm/ps), if the owning context tracks them
    pub velocities: Option<Vec<Vector3<f64>>>,

    /// Orthorhombic box edge lengths (nm); `None` for non-periodic systems
    pub periodic_box: Option<Vector3<f64>>,
}

impl Configuration {
    pub fn new(positions: Vec<Vector3<f64>>) -> Self {
        Self {
            positions,
            velocities: None,
            periodic_box: None,
        }
    }

    pub fn with_box(mut self, lengths: Vector3<f64>) -> Self {
        self.periodic_box = Some(lengths);
        self
    }

    pub fn with_velocities(
        mut self,
        velocities: Vec<Vector3<f64>>,
    ) -> Result<Self, ConfigurationError> {
        if velocities.len() != self.positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                expected: self.positions.len(),
                actual: velocities.len(),
            });
        }
        self.velocities = Some(velocities);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn check_selection(&self, indices: &[usize]) -> Result<(), ConfigurationError> {
        if indices.is_empty() {
            return Err(ConfigurationError::EmptySelection);
        }
        match indices.iter().find(|&&i| i >= self.positions.len()) {
            Some(&bad) => Err(ConfigurationError::InvalidIndex(bad)),
            None => Ok(()),
        }
    }

    /// Mass-weighted center of the selected particles
    pub fn center_of_mass(
        &self,
        indices: &[usize],
        masses: &[f64],
    ) -> Result<Vector3<f64>, ConfigurationError> {
        self.check_selection(indices)?;
        if masses.len() != self.positions.len() {
            return Err(ConfigurationError::LengthMismatch {
                expected: self.positions.len(),
                actual: masses.len(),
            });
        }

        let mut total_mass = 0.0;
        let mut weighted = Vector3::zeros();
        for &i in indices {
            weighted += self.positions[i] * masses[i];
            total_mass += masses[i];
        }

        if total_mass > 0.0 {
            Ok(weighted / total_mass)
        } else {
            self.centroid(indices)
        }
    }

    /// Geometric center of the selected particles
    pub fn centroid(&self, indices: &[usize]) -> Result<Vector3<f64>, ConfigurationError> {
        self.check_selection(indices)?;
        let sum = indices
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + self.positions[i]);
        Ok(sum / indices.len() as f64)
    }

    /// Bounding box (min corner, max corner) of the selected particles
    pub fn bounding_box(
        &self,
        indices: &[usize],
    ) -> Result<(Vector3<f64>, Vector3<f64>), ConfigurationError> {
        self.check_selection(indices)?;

        let mut min = Vector3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Vector3::new(f64::MIN, f64::MIN, f64::MIN);
        for &i in indices {
            let p = &self.positions[i];
            min = min.inf(p);
            max = max.sup(p);
        }

        Ok((min, max))
    }

    /// Rotate the selected particles about `pivot`, then translate them.
    pub fn apply_rigid_body(
        &mut self,
        indices: &[usize],
        rotation: &UnitQuaternion<f64>,
        pivot: &Vector3<f64>,
        translation: &Vector3<f64>,
    ) -> Result<(), ConfigurationError> {
        self.check_selection(indices)?;
        for &i in indices {
            let relative = self.positions[i] - pivot;
            self.positions[i] = rotation.transform_vector(&relative) + pivot + translation;
        }
        Ok(())
    }

    /// Check that every selected particle lies inside `cell`
    pub fn selection_within(
        &self,
        indices: &[usize],
        cell: &Cell,
    ) -> Result<bool, ConfigurationError> {
        self.check_selection(indices)?;
        Ok(indices.iter().all(|&i| cell.contains(&self.positions[i])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Unit;
    use std::f64::consts::PI;

    fn square() -> Configuration {
        Configuration::new(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn test_centroid_and_center_of_mass() {
        let config = square();
        let all = [0, 1, 2, 3];
        assert_eq!(config.centroid(&all).unwrap(), Vector3::new(0.5, 0.5, 0.0));

        let masses = [3.0, 1.0, 0.0, 0.0];
        let com = config.center_of_mass(&[0, 1], &masses).unwrap();
        assert!((com - Vector3::new(0.25, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_selection_errors() {
        let config = square();
        assert_eq!(config.centroid(&[]), Err(ConfigurationError::EmptySelection));
        assert_eq!(config.centroid(&[0, 9]), Err(ConfigurationError::InvalidIndex(9)));
        assert!(matches!(
            config.center_of_mass(&[0], &[1.0]),
            Err(ConfigurationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_bounding_box() {
        let config = square();
        let (min, max) = config.bounding_box(&[1, 2, 3]).unwrap();
        assert_eq!(min, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_rigid_body_only_moves_selection() {
        let mut config = square();
        let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(Vector3::z()), PI);
        let pivot = Vector3::new(0.5, 0.0, 0.0);
        config
            .apply_rigid_body(&[0, 1], &rotation, &pivot, &Vector3::new(0.0, 0.0, 2.0))
            .unwrap();

        assert!((config.positions[0] - Vector3::new(1.0, 0.0, 2.0)).norm() < 1e-12);
        assert!((config.positions[1] - Vector3::new(0.0, 0.0, 2.0)).norm() < 1e-12);
        assert_eq!(config.positions[2], Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_cell_containment() {
        let config = square();
        let cell = Cell::new(Vector3::new(0.5, 0.5, 0.0), Vector3::new(1.0, 1.0, 1.0));
        assert!(config.selection_within(&[0, 1, 2, 3], &cell).unwrap());

        let small = Cell::new(Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5));
        assert!(!config.selection_within(&[0, 1], &small).unwrap());
    }

    #[test]
    fn test_velocity_length_checked() {
        let result = square().with_velocities(vec![Vector3::zeros()]);
        assert!(matches!(
            result,
            Err(ConfigurationError::LengthMismatch { expected: 4, actual: 1 })
        ));
    }
}
