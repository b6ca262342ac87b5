//! Pluqqy CLI: manage prompt, context, and rules components and compose
//! them into pipelines.
//!
//! With no subcommand it launches the interactive TUI.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
