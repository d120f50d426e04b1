//! Particle parameters and the element table used to build them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Elements supported by the built-in parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Hydrogen,
    Carbon,
    Nitrogen,
    Oxygen,
    Fluorine,
    Phosphorus,
    Sulfur,
    Chlorine,
    Argon,
    Bromine,
    Iodine,

    // For particles that don't match any of the above
    Unknown,
}

impl Element {
    /// Atomic mass in daltons
    pub fn mass(&self) -> f64 {
        match self {
            Element::Hydrogen => 1.008,
            Element::Carbon => 12.011,
            Element::Nitrogen => 14.007,
            Element::Oxygen => 15.999,
            Element::Fluorine => 18.998,
            Element::Phosphorus => 30.974,
            Element::Sulfur => 32.06,
            Element::Chlorine => 35.45,
            Element::Argon => 39.948,
            Element::Bromine => 79.904,
            Element::Iodine => 126.904,
            Element::Unknown => 12.0,
        }
    }

    /// Lennard-Jones sigma in nanometers
    pub fn sigma(&self) -> f64 {
        match self {
            Element::Hydrogen => 0.106908,
            Element::Carbon => 0.339967,
            Element::Nitrogen => 0.325000,
            Element::Oxygen => 0.295992,
            Element::Fluorine => 0.311815,
            Element::Phosphorus => 0.374177,
            Element::Sulfur => 0.356359,
            Element::Chlorine => 0.347094,
            Element::Argon => 0.340500,
            Element::Bromine => 0.395559,
            Element::Iodine => 0.418722,
            Element::Unknown => 0.340000,
        }
    }

    /// Lennard-Jones well depth in kJ/mol
    pub fn epsilon(&self) -> f64 {
        match self {
            Element::Hydrogen => 0.0656888,
            Element::Carbon => 0.359824,
            Element::Nitrogen => 0.711280,
            Element::Oxygen => 0.878640,
            Element::Fluorine => 0.255224,
            Element::Phosphorus => 0.836800,
            Element::Sulfur => 1.046000,
            Element::Chlorine => 1.108760,
            Element::Argon => 0.996000,
            Element::Bromine => 1.338880,
            Element::Iodine => 1.673600,
            Element::Unknown => 0.360000,
        }
    }

    /// Parse an element from the symbol column of an XYZ file
    pub fn from_symbol(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "H" => Element::Hydrogen,
            "C" => Element::Carbon,
            "N" => Element::Nitrogen,
            "O" => Element::Oxygen,
            "F" => Element::Fluorine,
            "P" => Element::Phosphorus,
            "S" => Element::Sulfur,
            "CL" => Element::Chlorine,
            "AR" => Element::Argon,
            "BR" => Element::Bromine,
            "I" => Element::Iodine,
            _ => Element::Unknown,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Element::Hydrogen => "H",
            Element::Carbon => "C",
            Element::Nitrogen => "N",
            Element::Oxygen => "O",
            Element::Fluorine => "F",
            Element::Phosphorus => "P",
            Element::Sulfur => "S",
            Element::Chlorine => "Cl",
            Element::Argon => "Ar",
            Element::Bromine => "Br",
            Element::Iodine => "I",
            Element::Unknown => "X",
        }
    }
}

/// Nonbonded parameters of a single particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub element: Element,

    /// Particle name (e.g., "C1", "LIG")
    pub name: String,

    /// Mass in daltons
    pub mass: f64,

    /// Partial charge in elementary charges
    pub charge: f64,

    /// Lennard-Jones sigma (nm)
    pub sigma: f64,

    /// Lennard-Jones epsilon (kJ/mol)
    pub epsilon: f64,
}

impl Particle {
    /// Create a particle with the element's default mass and LJ parameters
    pub fn new(element: Element, name: &str, charge: f64) -> Self {
        Self {
            element,
            name: name.to_string(),
            mass: element.mass(),
            charge,
            sigma: element.sigma(),
            epsilon: element.epsilon(),
        }
    }

    /// Override the Lennard-Jones parameters
    pub fn with_lj(mut self, sigma: f64, epsilon: f64) -> Self {
        self.sigma = sigma;
        self.epsilon = epsilon;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) [q={}, sigma={}, eps={}]",
            self.element.symbol(),
            self.name,
            self.charge,
            self.sigma,
            self.epsilon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_from_symbol() {
        assert_eq!(Element::from_symbol("C"), Element::Carbon);
        assert_eq!(Element::from_symbol("cl"), Element::Chlorine);
        assert_eq!(Element::from_symbol(" Ar "), Element::Argon);
        assert_eq!(Element::from_symbol("Xx"), Element::Unknown);
    }

    #[test]
    fn test_symbol_round_trip_for_known_elements() {
        for element in [Element::Hydrogen, Element::Oxygen, Element::Bromine] {
            assert_eq!(Element::from_symbol(element.symbol()), element);
        }
    }

    #[test]
    fn test_particle_defaults_follow_element() {
        let p = Particle::new(Element::Oxygen, "O1", -0.8);
        assert_eq!(p.mass, Element::Oxygen.mass());
        assert_eq!(p.sigma, Element::Oxygen.sigma());
        assert_eq!(p.charge, -0.8);
    }

    #[test]
    fn test_particle_overrides() {
        let p = Particle::new(Element::Argon, "AR", 0.0)
            .with_lj(0.3, 1.0)
            .with_mass(40.0);
        assert_eq!(p.sigma, 0.3);
        assert_eq!(p.epsilon, 1.0);
        assert_eq!(p.mass, 40.0);
        assert_eq!(format!("{}", p), "Ar(AR) [q=0, sigma=0.3, eps=1]");
    }
}
