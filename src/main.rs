//! Main executable for blues

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use blues::config::{parse_selection, SimulationConfig};
use blues::context::langevin::LangevinContext;
use blues::context::SimulationContext;
use blues::forcefield::alchemical::AlchemicalFunctions;
use blues::forcefield::softcore::SoftCoreForceField;
use blues::io::{parse_xyz, write_statistics, write_work_csv, IoError, XyzWriter};
use blues::ncmc::{Direction, MoveSession, NcmcEngine, SwitchingSchedule};
use blues::reporters::LogReporter;

/// Command-line arguments for the application
#[derive(Parser, Debug)]
#[clap(
    name = "blues",
    version = blues::VERSION,
    about = "Nonequilibrium candidate Monte Carlo for alchemically coupled subsystems"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run NCMC iterations interleaved with Langevin dynamics
    Run {
        /// XYZ file with the initial structure (ångström, optional charge column)
        #[clap(long, value_parser)]
        structure: PathBuf,

        /// Movable subsystem as a half-open zero-based range, e.g. 0:12
        #[clap(long)]
        ligand: Option<String>,

        /// JSON configuration file
        #[clap(long, short, value_parser)]
        config: Option<PathBuf>,

        /// Number of NCMC iterations
        #[clap(long)]
        iterations: Option<usize>,

        /// λ steps per NCMC cycle
        #[clap(long)]
        ncmc_steps: Option<usize>,

        /// Conventional MD steps between NCMC cycles
        #[clap(long)]
        md_steps: Option<usize>,

        /// Random seed for dynamics and move proposals
        #[clap(long)]
        seed: Option<u64>,

        /// Log a state-data row every N λ steps
        #[clap(long)]
        report_interval: Option<usize>,

        /// Output prefix for the trajectory, work and statistics files
        #[clap(long, short, value_parser, default_value = "blues")]
        out: PathBuf,
    },

    /// Print a switching schedule with its alchemical scaling factors
    Schedule {
        /// Number of λ steps
        #[clap(long, default_value_t = 10)]
        steps: usize,

        /// Traverse λ from 1 to 0
        #[clap(long)]
        backward: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            structure,
            ligand,
            config,
            iterations,
            ncmc_steps,
            md_steps,
            seed,
            report_interval,
            out,
        } => {
            let mut config = match config {
                Some(path) => SimulationConfig::from_file(&path).with_context(|| {
                    format!("Failed to read config file: {}", path.display())
                })?,
                None => SimulationConfig::default(),
            };

            // Command-line flags take precedence over the file
            if ligand.is_some() {
                config.ligand = ligand;
            }
            if let Some(v) = iterations {
                config.iterations = v;
            }
            if let Some(v) = ncmc_steps {
                config.ncmc_steps = v;
                config.lambda_values = None;
            }
            if let Some(v) = md_steps {
                config.md_steps = v;
            }
            if let Some(v) = seed {
                config.seed = v;
            }
            if let Some(v) = report_interval {
                config.report_interval = v;
            }
            config.validate().context("Invalid configuration")?;

            run(&config, &structure, &out)
        }

        Commands::Schedule { steps, backward } => {
            let direction = if backward {
                Direction::Backward
            } else {
                Direction::Forward
            };
            let schedule = SwitchingSchedule::new(steps, direction);
            let functions = AlchemicalFunctions::default();

            println!(
                "{:>6} {:>10} {:>10} {:>15}",
                "index", "lambda", "sterics", "electrostatics"
            );
            for (index, lambda) in schedule.iter().enumerate() {
                let marker = if index == schedule.midpoint() { "  <- move" } else { "" };
                println!(
                    "{:>6} {:>10.4} {:>10.4} {:>15.4}{}",
                    index,
                    lambda,
                    functions.sterics(lambda),
                    functions.electrostatics(lambda),
                    marker
                );
            }
            Ok(())
        }
    }
}

fn run(config: &SimulationConfig, structure_path: &Path, prefix: &Path) -> Result<()> {
    let selection = match &config.ligand {
        Some(selection) => selection,
        None => bail!("A movable subsystem must be given with --ligand or in the config file"),
    };

    info!("Loading structure: {}", structure_path.display());
    let structure = parse_xyz(structure_path)
        .with_context(|| format!("Failed to parse structure: {}", structure_path.display()))?;
    let indices = parse_selection(selection)?;
    if let Some(&last) = indices.last() {
        if last >= structure.particles.len() {
            bail!(
                "Selection {} exceeds the {} particles in {}",
                selection,
                structure.particles.len(),
                structure_path.display()
            );
        }
    }
    info!(
        "{} particles, {} in the movable subsystem",
        structure.particles.len(),
        indices.len()
    );

    let particles = structure.particles.clone();
    let context = LangevinContext::new(
        structure.particles,
        structure.configuration,
        &indices,
        SoftCoreForceField::with_params(config.forcefield.clone()),
        config.integrator.clone(),
        config.seed,
    )
    .context("Failed to build the simulation context")?
    .with_alchemical_functions(config.alchemical);

    let mover = config.build_move(&indices, context.masses())?;
    info!("Using {} move", mover.name());
    let mut engine = NcmcEngine::new(config.schedule()?, mover, config.engine_params())?;
    if config.report_interval > 0 {
        engine.add_reporter(Box::new(LogReporter::new(config.report_interval, "ncmc")));
    }

    let mut session = MoveSession::new(context, engine, config.md_steps);
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

    let trajectory_path = with_suffix(prefix, ".xyz");
    let mut trajectory = XyzWriter::create(&trajectory_path)
        .with_context(|| format!("Failed to create {}", trajectory_path.display()))?;
    trajectory.write_frame(&particles, session.context().positions(), "initial")?;

    let mut write_error: Option<IoError> = None;
    let summary = session.run_iterations_with(config.iterations, &mut rng, |record, context| {
        if !record.outcome.is_accepted() || write_error.is_some() {
            return;
        }
        let comment = format!(
            "iteration={} work={:.6}",
            record.iteration,
            record.work.unwrap_or(0.0)
        );
        if let Err(e) = trajectory.write_frame(&particles, context.positions(), &comment) {
            warn!("Failed to write frame for iteration {}: {}", record.iteration, e);
            write_error = Some(e);
        }
    })?;
    trajectory.flush()?;
    if let Some(e) = write_error {
        return Err(anyhow::Error::new(e)
            .context(format!("Failed to write {}", trajectory_path.display())));
    }

    let work_path = with_suffix(prefix, "_work.csv");
    write_work_csv(session.statistics().records(), &work_path)
        .with_context(|| format!("Failed to write {}", work_path.display()))?;
    let stats_path = with_suffix(prefix, "_stats.json");
    write_statistics(session.statistics(), &stats_path)
        .with_context(|| format!("Failed to write {}", stats_path.display()))?;

    info!(
        "Wrote {} accepted frames to {}",
        trajectory.frames() - 1,
        trajectory_path.display()
    );
    println!(
        "{} iterations: {} accepted, {} rejected ({} failed), acceptance rate {:.3}",
        summary.iterations, summary.accepted, summary.rejected, summary.failed, summary.acceptance_rate
    );
    Ok(())
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
