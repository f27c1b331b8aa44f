//! Bidirectional, ownership-aware metadata reconciliation
//!
//! This crate keeps entities in a source metadata catalog and a destination
//! catalog in step, implementing:
//!
//! - **Correlation store**: durable links between a source entity and its copy
//! - **Property translation**: attribute shapes converted in both directions
//!   without dropping data
//! - **Unique naming**: sibling name collisions resolved with ` (n)` suffixes
//! - **Change detection**: ownership-aware verdicts from timestamps
//! - **Entity reconciliation**: one verdict applied to one entity pair
//! - **Sweep orchestration**: whole scopes walked parents-first, including
//!   entities that only exist at the destination
//!
//! # Architecture
//!
//! ```text
//!                 metasync-cli
//!                      |
//!               SweepOrchestrator
//!                      |
//!               EntityReconciler
//!        +--------+----+-----+---------+
//!        |        |          |         |
//!     detect  translate   naming  CorrelationStore
//!                      |
//!          metasync-model (MetadataClient)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use metasync_core::{SweepOptions, SweepOrchestrator, SyncConfig};
//!
//! let config = SyncConfig::load_layered(Path::new("metasync.toml"))?;
//! let engine = SweepOrchestrator::from_config(&config, source, destination)?;
//! let report = engine.run(&config.scope("glossaries")?, &SweepOptions::default())?;
//! println!("{} created, {} failed", report.created, report.failed());
//! ```

pub mod audit;
pub mod catalog;
pub mod config;
pub mod correlation;
pub mod detect;
pub mod error;
pub mod logging;
pub mod naming;
pub mod reconcile;
pub mod sweep;
pub mod translate;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use catalog::MemoryCatalog;
pub use config::{ScopeLevel, StoreBackend, SyncConfig, SyncScope};
pub use correlation::{
    CorrelationStore, FileCorrelationStore, LinkedCorrelationStore, MemoryCorrelationStore,
};
pub use detect::{Detection, Verdict, detect};
pub use error::{Error, ErrorKind, Result};
pub use naming::UniqueNameResolver;
pub use reconcile::{EntityReconciler, ReconcileOptions, ReconcileOutcome};
pub use sweep::{
    CancellationFlag, DestinationEvent, EventDisposition, EventKind, SweepFailure, SweepOptions,
    SweepOrchestrator, SweepReport, SweepSettings,
};
pub use translate::{AttributeDictionary, DictionaryMapper, PropertyMapper};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_config_not_found_displays_path() {
        let path = PathBuf::from("/path/to/metasync.toml");
        let error = Error::ConfigNotFound { path };

        let display = format!("{}", error);
        assert!(
            display.contains("/path/to/metasync.toml"),
            "Error display should contain the path, got: {}",
            display
        );
        assert!(error.is_fatal());
    }
}
