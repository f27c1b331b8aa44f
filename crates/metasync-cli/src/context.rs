//! Loaded configuration plus the two snapshot-backed catalogs
//!
//! The CLI runs against catalogs held in JSON snapshot files named in the
//! `[catalogs]` section. Snapshots are written back only after commands that
//! changed them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metasync_core::config::StoreBackend;
use metasync_core::{CorrelationStore, MemoryCatalog, SyncConfig};
use metasync_model::CorrelationLinks;

use crate::error::{CliError, Result};

pub struct Session {
    pub config: SyncConfig,
    pub source: Arc<MemoryCatalog>,
    pub destination: Arc<MemoryCatalog>,
    source_path: PathBuf,
    destination_path: PathBuf,
}

impl Session {
    /// Load and validate the configuration, then both snapshots
    pub fn open(config_path: &Path) -> Result<Self> {
        let config = SyncConfig::load_layered(config_path)?;
        config.validate()?;

        let source_path = snapshot_path(config.catalogs.source.as_ref(), "source")?;
        let destination_path = snapshot_path(config.catalogs.destination.as_ref(), "destination")?;
        tracing::debug!(
            source = %source_path.display(),
            destination = %destination_path.display(),
            "Loading catalog snapshots"
        );

        Ok(Self {
            source: Arc::new(MemoryCatalog::load(&source_path)?),
            destination: Arc::new(MemoryCatalog::load(&destination_path)?),
            config,
            source_path,
            destination_path,
        })
    }

    /// Open the configured correlation store
    pub fn store(&self) -> Result<Box<dyn CorrelationStore>> {
        let links: Arc<dyn CorrelationLinks> = self.destination.clone();
        Ok(self.config.store.open(Some(links))?)
    }

    /// Whether correlation records live in the destination snapshot
    pub fn store_in_destination(&self) -> bool {
        self.config.store.backend == StoreBackend::Destination
    }

    /// Write both snapshots back
    pub fn save(&self) -> Result<()> {
        self.source.save(&self.source_path)?;
        self.save_destination()
    }

    pub fn save_destination(&self) -> Result<()> {
        self.destination.save(&self.destination_path)?;
        Ok(())
    }
}

fn snapshot_path(configured: Option<&PathBuf>, side: &str) -> Result<PathBuf> {
    let path = configured.ok_or_else(|| {
        CliError::user(format!("No {} catalog configured under [catalogs]", side))
    })?;
    if !path.exists() {
        return Err(CliError::user(format!(
            "{} catalog snapshot not found: {}",
            side,
            path.display()
        )));
    }
    Ok(path.clone())
}
