//! Correlation store administration: reassign and forget

use std::path::Path;

use colored::Colorize;
use metasync_model::Side;

use crate::context::Session;
use crate::error::{CliError, Result};

/// Run the reassign command
///
/// Ownership is otherwise fixed when a record is created; this is the only
/// way to change it.
pub fn run_reassign(config_path: &Path, source_key: &str, owner: Side) -> Result<()> {
    let session = Session::open(config_path)?;
    let mut store = session.store()?;

    let mut record = store
        .lookup_by_source(source_key)?
        .ok_or_else(|| CliError::user(format!("No correlation record for {}", source_key)))?;

    if record.owner() == owner {
        println!(
            "{} {} is already owned by the {}.",
            "OK".green().bold(),
            source_key.cyan(),
            owner
        );
        return Ok(());
    }

    record.reassign_owner(owner);
    store.upsert(record)?;
    if session.store_in_destination() {
        session.save_destination()?;
    }
    tracing::info!(source_key, owner = %owner, "Ownership reassigned");

    println!(
        "{} {} is now owned by the {}.",
        "OK".green().bold(),
        source_key.cyan(),
        owner
    );
    Ok(())
}

/// Run the forget command
pub fn run_forget(config_path: &Path, source_key: &str) -> Result<()> {
    let session = Session::open(config_path)?;
    let mut store = session.store()?;

    let removed = store
        .delete(source_key)?
        .ok_or_else(|| CliError::user(format!("No correlation record for {}", source_key)))?;
    if session.store_in_destination() {
        session.save_destination()?;
    }
    tracing::info!(source_key, "Correlation forgotten");

    println!(
        "{} Forgot {} -> {}",
        "OK".green().bold(),
        removed.source_key.cyan(),
        removed.destination_key.as_deref().unwrap_or("-").cyan()
    );
    Ok(())
}
