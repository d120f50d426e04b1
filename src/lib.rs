//! blues: nonequilibrium candidate Monte Carlo (NCMC) for alchemically
//! coupled molecular subsystems
//!
//! An NCMC cycle switches a movable subsystem's interactions off along a
//! λ schedule, applies a structural move, switches them back on and
//! accepts or rejects the result with a work-corrected Metropolis test.
//! The engine talks to dynamics through the [`context::SimulationContext`]
//! trait; [`context::langevin::LangevinContext`] is a reference
//! implementation over a soft-core forcefield.

pub mod config;
pub mod configuration;
pub mod context;
pub mod forcefield;
pub mod io;
pub mod math;
pub mod moves;
pub mod ncmc;
pub mod particle;
pub mod reporters;

// Re-export commonly used types
pub use config::SimulationConfig;
pub use configuration::Configuration;
pub use context::SimulationContext;
pub use moves::{Move, MoveDelta, ProposalParameters};
pub use ncmc::{
    AcceptanceTest, CycleOutcome, CycleReport, Direction, EngineParams, MoveSession,
    MoveStatistics, NcmcEngine, NcmcError, SwitchingSchedule, WorkAccumulator,
};
pub use particle::Particle;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
