//! ## tidvakt-cli
//! **Operational interface for the tidvakt virtual-time toolkit**
//!
//! Replays scenario files against the deterministic scheduler and generates
//! reproducible random scenarios for regression hunting.

use clap::Parser;

mod commands;
mod logging;

use commands::Cli;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init();
    let cli = Cli::parse();
    commands::run_command(cli)
}
