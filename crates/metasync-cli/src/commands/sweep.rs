//! Sweep command implementation

use std::path::Path;

use colored::Colorize;
use metasync_core::{SweepOptions, SweepOrchestrator, SweepReport, SyncScope};

use crate::context::Session;
use crate::error::{CliError, Result};

/// Run the sweep command
///
/// Scopes are swept in configuration order. A scope that cannot be swept is
/// reported and the remaining scopes still run.
pub fn run_sweep(config_path: &Path, scope: Option<&str>, dry_run: bool, json: bool) -> Result<()> {
    let session = Session::open(config_path)?;
    let scopes: Vec<SyncScope> = match scope {
        Some(name) => vec![session.config.scope(name)?],
        None => session.config.scopes(),
    };
    if scopes.is_empty() {
        return Err(CliError::user("No scopes configured"));
    }

    let engine = SweepOrchestrator::from_config(
        &session.config,
        session.source.clone(),
        session.destination.clone(),
    )?;
    let options = SweepOptions { dry_run };

    let mut reports = Vec::new();
    let mut aborted = Vec::new();
    for scope in &scopes {
        if !json {
            println!(
                "{} Sweeping {} ({})...",
                "=>".blue().bold(),
                scope.name.cyan(),
                scope.direction
            );
        }
        match engine.run(scope, &options) {
            Ok(report) => {
                if !json {
                    print_report(&report);
                }
                reports.push(report);
            }
            Err(e) => {
                if !json {
                    println!("{} {}", "ERROR".red().bold(), e);
                }
                aborted.push(format!("{}: {}", scope.name, e));
            }
        }
    }

    if !dry_run {
        session.save()?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let failed: usize = reports.iter().map(SweepReport::failed).sum();
    if !aborted.is_empty() {
        return Err(CliError::user(format!(
            "{} scope(s) could not be swept: {}",
            aborted.len(),
            aborted.join("; ")
        )));
    }
    if failed > 0 {
        return Err(CliError::user(format!(
            "Sweep finished with {} failed entit{}",
            failed,
            if failed == 1 { "y" } else { "ies" }
        )));
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    for action in &report.actions {
        println!("   {} {}", "+".green(), action);
    }
    for failure in &report.failures {
        println!(
            "   {} {} ({}): {}",
            "!".red(),
            failure.key.cyan(),
            failure.side.to_string().dimmed(),
            failure.reason
        );
    }

    let tally = format!(
        "{} created, {} updated, {} deleted, {} unchanged, {} failed",
        report.created,
        report.updated,
        report.deleted,
        report.unchanged,
        report.failed()
    );
    if report.success() {
        if report.has_writes() {
            let label = if report.dry_run { "DRY-RUN" } else { "OK" };
            println!("{} {}", label.green().bold(), tally);
        } else {
            println!("{} Already synchronized. {}", "OK".green().bold(), tally);
        }
    } else {
        println!("{} {}", "FAILED".red().bold(), tally);
    }
}
