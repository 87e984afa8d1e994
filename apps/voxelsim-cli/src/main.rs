mod config;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use voxelsim_common::{GridSize, count_visible, frame_digest};
use voxelsim_kernel::{GameOfLife3D, Maxwell, Simulation};
use voxelsim_persist::{Playback, Recorder, inspect_trace};
use voxelsim_runtime::Driver;

use crate::config::{Overrides, RunConfig, SimKind};

#[derive(Parser)]
#[command(name = "voxelsim", about = "Run, record, replay and inspect voxel simulations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Step a simulation headless and report the final frame
    Run {
        #[command(flatten)]
        sim: SimArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Step a simulation while writing every frame to a trace file
    Record {
        #[command(flatten)]
        sim: SimArgs,
        /// Trace file to create
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Replay a trace until it runs out
    Play {
        /// Trace file to replay
        #[arg(short, long)]
        trace: PathBuf,
        /// Stop after this many steps
        #[arg(long)]
        steps: Option<u64>,
    },
    /// Summarize a trace file
    Inspect {
        /// Trace file to scan
        #[arg(short, long)]
        trace: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SimArgs {
    /// Simulation to run
    #[arg(long, value_enum)]
    sim: Option<SimKind>,
    #[arg(long)]
    rows: Option<u32>,
    #[arg(long)]
    cols: Option<u32>,
    #[arg(long)]
    stacks: Option<u32>,
    /// Number of steps to take
    #[arg(short, long)]
    steps: Option<u64>,
    /// Requested dt per step
    #[arg(long)]
    dt: Option<f64>,
    /// Seed for the automaton's starting pattern
    #[arg(long)]
    seed: Option<u64>,
    /// YAML run file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SimArgs {
    fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("failed to load run file {}", path.display()))?,
            None => RunConfig::default(),
        };
        config.apply(&Overrides {
            simulation: self.sim,
            rows: self.rows,
            cols: self.cols,
            stacks: self.stacks,
            steps: self.steps,
            dt: self.dt,
            seed: self.seed,
        });
        tracing::debug!(?config, "run configuration resolved");
        Ok(config)
    }
}

#[derive(Serialize)]
struct RunSummary {
    simulation: &'static str,
    grid: GridSize,
    steps: u64,
    simulation_time: f64,
    visible: usize,
    digest: String,
    /// Simulated seconds per wall second over the last steps.
    sim_rate: f64,
}

impl RunSummary {
    fn of(driver: &Driver, steps: u64) -> Self {
        let sim = driver.simulation();
        Self {
            simulation: sim.name(),
            grid: sim.grid_size(),
            steps,
            simulation_time: sim.simulation_time(),
            visible: count_visible(sim.voxels(), 0),
            digest: format!("{:016x}", frame_digest(sim.voxels())),
            sim_rate: driver.sim_rate(),
        }
    }

    fn print(&self) {
        println!("Simulation: {}", self.simulation);
        println!("Grid: {}", self.grid);
        println!("Steps: {}", self.steps);
        println!("Time: {:.4}", self.simulation_time);
        println!("Visible voxels: {}", self.visible);
        println!("Frame digest: {}", self.digest);
        println!("Sim rate: {:.4} sim-s/s", self.sim_rate);
    }
}

/// Step a playback until its trace runs out or `limit` records have been
/// applied, writing one line per record. Zero-dt records are replayed like
/// any other; only the playback itself decides when the trace is over.
fn replay_trace(playback: &mut Playback, limit: Option<u64>, out: &mut impl Write) -> anyhow::Result<u64> {
    let limit = limit.unwrap_or(u64::MAX);
    while playback.steps_played() < limit {
        let dt = playback.step(0.0)?;
        if playback.is_exhausted() {
            break;
        }
        writeln!(
            out,
            "step {:>5}  dt={:.4}  t={:.4}  visible={}  digest={:016x}",
            playback.steps_played(),
            dt,
            playback.simulation_time(),
            count_visible(playback.voxels(), 0),
            frame_digest(playback.voxels())
        )?;
    }
    Ok(playback.steps_played())
}

fn build_simulation(config: &RunConfig) -> anyhow::Result<Box<dyn Simulation>> {
    let sim: Box<dyn Simulation> = match config.simulation {
        SimKind::Life => Box::new(GameOfLife3D::with_config(config.grid, config.life.clone())?),
        SimKind::Fdtd => Box::new(Maxwell::with_config(config.grid, config.fdtd.clone())?),
    };
    Ok(sim)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("voxelsim v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", voxelsim_common::crate_info());
            println!("kernel: {}", voxelsim_kernel::crate_info());
            println!("persist: {}", voxelsim_persist::crate_info());
            println!("runtime: {}", voxelsim_runtime::crate_info());
        }
        Commands::Run { sim, json } => {
            let config = sim.resolve()?;
            let mut driver = Driver::new(build_simulation(&config)?, config.pacer.clone());
            let report = driver.run_steps(config.steps)?;
            let summary = RunSummary::of(&driver, report.steps);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                summary.print();
            }
        }
        Commands::Record { sim, out } => {
            let config = sim.resolve()?;
            let recorder = Recorder::create(build_simulation(&config)?, &out)
                .with_context(|| format!("failed to start recording to {}", out.display()))?;
            let mut driver = Driver::new(Box::new(recorder), config.pacer.clone());
            let report = driver.run_steps(config.steps)?;
            RunSummary::of(&driver, report.steps).print();
            // Release the trace file before scanning it.
            drop(driver);

            let trace = inspect_trace(&out)?;
            println!("Trace: {} ({} records, {} bytes)", out.display(), trace.records, trace.file_size);
            println!("SHA-256: {}", trace.sha256);
        }
        Commands::Play { trace, steps } => {
            let mut playback = Playback::open(&trace)
                .with_context(|| format!("failed to open trace {}", trace.display()))?;
            println!("Replaying {} ({})", trace.display(), playback.grid_size());
            let played = replay_trace(&mut playback, steps, &mut std::io::stdout().lock())?;
            println!("Replayed {played} steps");
        }
        Commands::Inspect { trace, json } => {
            let summary = inspect_trace(&trace)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Grid: {}", summary.grid);
                println!("Records: {}", summary.records);
                println!("Total time: {:.4}", summary.total_time);
                println!("Trailing bytes: {}", summary.trailing_bytes);
                println!("File size: {}", summary.file_size);
                println!("SHA-256: {}", summary.sha256);
            }
        }
    }

    Ok(())
}
