//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use metasync_core::config::CONFIG_FILE;
use metasync_model::Side;

/// metasync - Reconcile metadata between a source and a destination catalog
#[derive(Parser, Debug)]
#[command(name = "metasync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the sync configuration
    #[arg(short, long, global = true, env = "METASYNC_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run a reconciliation sweep
    ///
    /// Sweeps every configured scope, or only the one named with --scope.
    ///
    /// Examples:
    ///   metasync sweep                    # All scopes
    ///   metasync sweep --scope glossaries # One scope
    ///   metasync sweep --dry-run          # Report what would change
    Sweep {
        /// Only sweep this scope
        #[arg(short, long)]
        scope: Option<String>,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Output the sweep reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show correlation records
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Change which side is authoritative for a correlated entity
    Reassign {
        /// Source key of the correlated entity
        source_key: String,

        /// New owner
        #[arg(long, value_enum)]
        owner: OwnerArg,
    },

    /// Drop the correlation record for a source key
    ///
    /// Neither entity is touched. The next sweep treats them as unrelated.
    Forget {
        /// Source key of the correlated entity
        source_key: String,
    },

    /// Parse and validate the configuration
    Validate,

    /// Generate shell completions
    ///
    /// Examples:
    ///   metasync completions bash > ~/.local/share/bash-completion/completions/metasync
    ///   metasync completions zsh > ~/.zfunc/_metasync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Side named on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerArg {
    Source,
    Destination,
}

impl From<OwnerArg> for Side {
    fn from(owner: OwnerArg) -> Self {
        match owner {
            OwnerArg::Source => Side::Source,
            OwnerArg::Destination => Side::Destination,
        }
    }
}
