//! Status command implementation

use std::path::Path;

use colored::Colorize;
use metasync_core::correlation::MAPPING_SCOPE;
use metasync_model::Side;

use crate::context::Session;
use crate::error::Result;

/// Run the status command
pub fn run_status(config_path: &Path, json: bool) -> Result<()> {
    let session = Session::open(config_path)?;
    let records = session.store()?.records()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("{}", "Correlation Status".bold());
    println!();
    println!("{}:   {}", "Config".dimmed(), config_path.display());
    println!("{}:    {:?}", "Store".dimmed(), session.config.store.backend);
    println!("{}:  {}", "Records".dimmed(), records.len());
    println!();

    if records.is_empty() {
        println!("  {} (run {} to correlate)", "None".dimmed(), "metasync sweep".cyan());
        return Ok(());
    }

    for record in &records {
        let owner = match record.owner() {
            Side::Source => "source".green(),
            Side::Destination => "destination".yellow(),
        };
        println!(
            "  {} {} -> {} [{}] {} {}",
            "+".green(),
            record.source_key.cyan(),
            record.destination_key.as_deref().unwrap_or("-").cyan(),
            owner,
            record.mapping_property(MAPPING_SCOPE).unwrap_or("-").dimmed(),
            record.last_synchronized_at.to_rfc3339().dimmed()
        );
    }
    Ok(())
}
