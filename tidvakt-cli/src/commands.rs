//! Command definitions and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use tidvakt_config::TidvaktConfig;
use tidvakt_harness::{generate::generate, replay_file};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scenario file and print its deterministic state hash
    Replay(ReplayArgs),
    /// Generate a reproducible random scenario from a seed
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Scenario file to replay
    #[arg(short, long)]
    pub scenario: PathBuf,
    /// Optional configuration file (clock defaults when the scenario has
    /// no clock section)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Fail unless the run produces exactly this state hash
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Print every timer fire, not just the hash
    #[arg(long, default_value_t = false)]
    pub trace: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Number of steps (defaults to the configured step count)
    #[arg(long)]
    pub steps: Option<usize>,
    /// Write the scenario here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Optional configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match cli.command {
        Commands::Replay(args) => run_replay(args),
        Commands::Generate(args) => run_generate(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TidvaktConfig, Box<dyn std::error::Error + Send + Sync>> {
    Ok(match path {
        Some(path) => TidvaktConfig::load_from_path(path)?,
        None => TidvaktConfig::load()?,
    })
}

fn run_replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = load_config(args.config.as_ref())?;
    let report = replay_file(&args.scenario, &config.clock)?;

    if args.trace {
        for (ordinal, fire) in report.fires.iter().enumerate() {
            println!("{:>6}  {:>16}ns  {}", ordinal, fire.at_ns, fire.label);
        }
    }
    info!(
        fires = report.fires.len(),
        final_now_ns = report.final_now_ns,
        "replay finished"
    );
    println!("{}", report.state_hash);

    if let Some(expected) = args.validate_hash {
        if expected != report.state_hash {
            return Err(format!(
                "state hash mismatch: expected {}, got {}",
                expected, report.state_hash
            )
            .into());
        }
    }
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = load_config(args.config.as_ref())?;
    let seed = args.seed;
    let steps = args.steps.unwrap_or(config.harness.step_count);

    let scenario = generate(seed, steps);
    match args.output {
        Some(path) => {
            scenario.to_yaml_file(&path)?;
            info!(?path, seed, steps, "scenario written");
        }
        None => print!("{}", scenario.to_yaml()?),
    }
    Ok(())
}
