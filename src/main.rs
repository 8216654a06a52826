//! Command-line entry point: run the PF distress simulation or the equity
//! runway variant, print a summary and write per-trial artifacts.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pfsim::config::{RunwayConfig, SimulationConfig};
use pfsim::report;
use pfsim::runway::{self, RunwayModel};
use pfsim::simulation::{self, Execution, MonteCarlo};
use pfsim::types::Month;

#[derive(Parser, Debug)]
#[command(name = "pfsim", about = "Monte Carlo distress simulator for leveraged PF projects")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full three-phase PF simulation.
    Pf(RunArgs),
    /// Single-phase equity runway through the construction dead zone.
    Runway(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of trials.
    #[arg(long)]
    iterations: Option<u64>,
    /// Months to simulate (PF: defaults to the exit month).
    #[arg(long)]
    months: Option<u32>,
    /// Base seed; trial i uses seed + i.
    #[arg(long)]
    seed: Option<u64>,
    /// Run trials on one thread.
    #[arg(long)]
    serial: bool,
    /// Per-trial CSV path; a JSON summary is written next to it.
    #[arg(long)]
    output: Option<PathBuf>,
    /// JSON file overriding the canonical assumptions.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip the console summary.
    #[arg(long)]
    quiet: bool,
}

impl RunArgs {
    fn execution(&self) -> Execution {
        if self.serial { Execution::Serial } else { Execution::Parallel }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "loaded config override");
    Ok(config)
}

fn run_pf(args: &RunArgs) -> Result<()> {
    let mut config: SimulationConfig = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut mc = MonteCarlo::from_config(config)?
        .iterations(args.iterations.unwrap_or(simulation::DEFAULT_ITERATIONS))
        .execution(args.execution());
    if let Some(months) = args.months {
        mc = mc.until(Month(months));
    }
    let result = mc.run()?;

    if !args.quiet {
        println!("{}", report::render_pf_summary(&result, mc.config()));
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("reports/pf_outcomes.csv"));
    report::write_pf_report(&result, &output)?;
    info!(path = %output.display(), "wrote PF outcomes");
    Ok(())
}

fn run_runway(args: &RunArgs) -> Result<()> {
    let mut config: RunwayConfig = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let model = RunwayModel::new(config)?;
    let summary = runway::run(
        &model,
        args.iterations.unwrap_or(runway::DEFAULT_ITERATIONS),
        args.months.unwrap_or(runway::DEFAULT_MONTHS),
        args.execution(),
    )?;

    if !args.quiet {
        println!("{}", report::render_runway_summary(&summary, model.config()));
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("reports/runway_months.csv"));
    report::write_runway_report(&summary, &output)?;
    info!(path = %output.display(), "wrote runway outcomes");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match &cli.command {
        Command::Pf(args) => run_pf(args),
        Command::Runway(args) => run_runway(args),
    };
    if let Err(e) = &outcome {
        error!("{e:#}");
    }
    outcome
}
