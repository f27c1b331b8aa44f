//! Sync configuration
//!
//! Configuration is loaded from TOML and merged in order (later overrides
//! earlier):
//!
//! 1. **Base** - `metasync.toml`
//! 2. **Local overrides** - `metasync.local.toml` next to it (optional)
//!
//! # Example
//!
//! ```ignore
//! use metasync_core::config::SyncConfig;
//!
//! let config = SyncConfig::load_layered(Path::new("metasync.toml"))?;
//! config.validate()?;
//! for scope in config.scopes() {
//!     println!("{} ({})", scope.name, scope.direction);
//! }
//! ```

mod scope;
mod settings;

pub use scope::{ScopeDefinition, ScopeLevel, SyncScope};
pub use settings::{
    CONFIG_FILE, CatalogsSection, StoreBackend, StoreSection, SyncConfig, SyncSection, local_path,
};
