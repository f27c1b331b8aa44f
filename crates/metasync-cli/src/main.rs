//! metasync CLI
//!
//! Runs reconciliation sweeps over snapshot-backed catalogs and administers
//! the correlation store.

mod cli;
mod commands;
mod context;
mod error;

use std::path::Path;

use clap::{CommandFactory, Parser};
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        if let Err(e) = metasync_core::logging::init("debug") {
            eprintln!("{}: could not set up logging: {}", "warning".yellow().bold(), e);
        }
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(&cli.config, cmd),
        None => {
            println!("{} metadata reconciliation", "metasync".green().bold());
            println!();
            println!("Run {} for available commands.", "metasync --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(config: &Path, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Sweep {
            scope,
            dry_run,
            json,
        } => commands::run_sweep(config, scope.as_deref(), dry_run, json),
        Commands::Status { json } => commands::run_status(config, json),
        Commands::Reassign { source_key, owner } => {
            commands::run_reassign(config, &source_key, owner.into())
        }
        Commands::Forget { source_key } => commands::run_forget(config, &source_key),
        Commands::Validate => commands::run_validate(config),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "metasync", &mut std::io::stdout());
            Ok(())
        }
    }
}
