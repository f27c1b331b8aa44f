//! Validate command implementation

use std::path::Path;

use colored::Colorize;
use metasync_core::{ScopeLevel, SyncConfig};

use crate::error::Result;

/// Run the validate command
///
/// Parses and validates the configuration without touching any catalog.
pub fn run_validate(config_path: &Path) -> Result<()> {
    let config = SyncConfig::load_layered(config_path)?;
    config.validate()?;

    println!("{} {} is valid.", "OK".green().bold(), config_path.display());
    println!();
    println!("{}:", "Scopes".bold());
    let scopes = config.scopes();
    if scopes.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for scope in &scopes {
        println!(
            "  {} {} [{}] {}",
            "+".green(),
            scope.name.cyan(),
            scope.category,
            scope.direction.to_string().dimmed()
        );
        print_level(&scope.root, 2);
    }
    if let Some(q) = &config.sync.qualifier {
        println!();
        println!("{}: {}", "Qualifier".dimmed(), q);
    }
    Ok(())
}

fn print_level(level: &ScopeLevel, indent: usize) {
    let via = match (&level.source_relationship, &level.destination_relationship) {
        (Some(src), Some(dst)) => format!(" via {}/{}", src, dst),
        _ => String::new(),
    };
    println!(
        "{:indent$}{} -> {}{}",
        "",
        level.source_type,
        level.destination_type,
        via.dimmed(),
        indent = indent * 2
    );
    for child in &level.children {
        print_level(child, indent + 1);
    }
}
