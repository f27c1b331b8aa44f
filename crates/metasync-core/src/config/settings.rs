//! Sync configuration parsed from `metasync.toml`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::scope::{ScopeDefinition, ScopeLevel, SyncScope};
use crate::correlation::{
    CorrelationStore, FileCorrelationStore, LinkedCorrelationStore, MemoryCorrelationStore,
};
use crate::translate::AttributeDictionary;
use crate::{Error, Result};
use metasync_model::{CorrelationLinks, Direction};

/// Default configuration file name
pub const CONFIG_FILE: &str = "metasync.toml";

const DEFAULT_STORE_FILE: &str = "metasync-correlations.toml";

fn default_page_size() -> usize {
    100
}

fn default_user_id() -> String {
    "metasync".to_string()
}

/// `[sync]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSection {
    /// Page size used when enumerating by type
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Sync only the top-level entity with this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,

    /// Recorded as the creator on correlation records
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            qualifier: None,
            user_id: default_user_id(),
        }
    }
}

/// Where correlation records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
    /// Inside the destination system, through its link primitives
    Destination,
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreSection {
    /// Path of the file backend's store
    pub fn file_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }

    /// Open the configured backend
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the destination backend is
    /// selected without a destination to link through, or any error from
    /// opening the file backend.
    pub fn open(
        &self,
        links: Option<Arc<dyn CorrelationLinks>>,
    ) -> Result<Box<dyn CorrelationStore>> {
        match self.backend {
            StoreBackend::Memory => Ok(Box::new(MemoryCorrelationStore::new())),
            StoreBackend::File => Ok(Box::new(FileCorrelationStore::open(self.file_path())?)),
            StoreBackend::Destination => {
                let links = links.ok_or_else(|| {
                    Error::config("store backend 'destination' needs a destination catalog")
                })?;
                Ok(Box::new(LinkedCorrelationStore::new(links)))
            }
        }
    }
}

/// `[catalogs]` section: snapshot files the CLI loads as the two systems
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

/// Complete sync configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncSection,

    /// Direction policy per entity category
    #[serde(default)]
    pub directions: BTreeMap<String, Direction>,

    #[serde(default)]
    pub scopes: Vec<ScopeDefinition>,

    #[serde(default)]
    pub mapping: AttributeDictionary,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub catalogs: CatalogsSection,
}

impl SyncConfig {
    /// Parse a configuration from TOML content
    ///
    /// ```
    /// use metasync_core::config::SyncConfig;
    ///
    /// let config = SyncConfig::parse(r#"
    /// [sync]
    /// page_size = 50
    ///
    /// [[scopes]]
    /// name = "glossaries"
    /// category = "glossary"
    /// source_type = "glossary"
    /// destination_type = "Glossary"
    /// "#).unwrap();
    ///
    /// assert_eq!(config.sync.page_size, 50);
    /// assert_eq!(config.scopes[0].name, "glossaries");
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load a single configuration file
    ///
    /// Relative store and catalog paths are resolved against the file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let table = read_table(path)?;
        let mut config: SyncConfig = toml::Value::Table(table).try_into()?;
        config.resolve_paths(path);
        Ok(config)
    }

    /// Load a configuration file and its optional `.local.toml` sibling
    ///
    /// Values in the local file override the base. Scopes are merged by
    /// name and directions by category; any other table merges key by key.
    pub fn load_layered(path: &Path) -> Result<Self> {
        let mut table = read_table(path)?;

        let local = local_path(path);
        if local.exists() {
            tracing::debug!(path = %local.display(), "Applying local overrides");
            merge_tables(&mut table, read_table(&local)?);
        }

        let mut config: SyncConfig = toml::Value::Table(table).try_into()?;
        config.resolve_paths(path);
        Ok(config)
    }

    fn resolve_paths(&mut self, config_path: &Path) {
        let Some(dir) = config_path.parent() else {
            return;
        };
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };

        let mut store_path = self.store.file_path();
        resolve(&mut store_path);
        self.store.path = Some(store_path);

        if let Some(p) = self.catalogs.source.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.catalogs.destination.as_mut() {
            resolve(p);
        }
    }

    /// Check the configuration for mistakes that would only surface
    /// mid-sweep
    pub fn validate(&self) -> Result<()> {
        if self.sync.page_size == 0 {
            return Err(Error::config("sync.page_size must be at least 1"));
        }
        if self.sync.user_id.trim().is_empty() {
            return Err(Error::config("sync.user_id must not be empty"));
        }

        let mut seen = BTreeSet::new();
        for scope in &self.scopes {
            if scope.name.trim().is_empty() {
                return Err(Error::config("scope name must not be empty"));
            }
            if !seen.insert(scope.name.as_str()) {
                return Err(Error::config(format!("duplicate scope '{}'", scope.name)));
            }
            if scope.category.trim().is_empty() {
                return Err(Error::config(format!(
                    "scope '{}' has an empty category",
                    scope.name
                )));
            }
            validate_level(&scope.name, &scope.root_level())?;
        }
        Ok(())
    }

    /// Direction policy for a category, defaulting to source-to-destination
    pub fn direction_for(&self, category: &str) -> Direction {
        self.directions.get(category).copied().unwrap_or_default()
    }

    /// All configured scopes with their direction and qualifier applied
    pub fn scopes(&self) -> Vec<SyncScope> {
        self.scopes.iter().map(|def| self.resolve_scope(def)).collect()
    }

    /// A single scope by name
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no scope has that name.
    pub fn scope(&self, name: &str) -> Result<SyncScope> {
        self.scopes
            .iter()
            .find(|def| def.name == name)
            .map(|def| self.resolve_scope(def))
            .ok_or_else(|| Error::config(format!("scope '{}' is not configured", name)))
    }

    fn resolve_scope(&self, def: &ScopeDefinition) -> SyncScope {
        let mut scope = SyncScope::new(&def.name, &def.category, def.root_level())
            .with_direction(self.direction_for(&def.category));
        if let Some(q) = &self.sync.qualifier {
            scope = scope.with_qualifier(q);
        }
        scope
    }
}

fn validate_level(scope: &str, level: &ScopeLevel) -> Result<()> {
    if level.source_type.trim().is_empty() || level.destination_type.trim().is_empty() {
        return Err(Error::config(format!(
            "scope '{}' has a level with an empty type name",
            scope
        )));
    }
    for child in &level.children {
        if child.source_relationship.is_none() || child.destination_relationship.is_none() {
            return Err(Error::config(format!(
                "scope '{}': child level {} needs a relationship on both sides",
                scope, child.source_type
            )));
        }
        validate_level(scope, child)?;
    }
    Ok(())
}

/// `metasync.toml` -> `metasync.local.toml`
pub fn local_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "metasync".to_string());
    path.with_file_name(format!("{}.local.toml", stem))
}

fn read_table(path: &Path) -> Result<toml::Table> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    let table: toml::Table = content.parse()?;
    Ok(table)
}

/// Merge `overlay` into `base`, overlay winning
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let replacement = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => {
                merge_tables(b, o);
                None
            }
            (Some(toml::Value::Array(b)), toml::Value::Array(o)) if key == "scopes" => {
                merge_named(b, o);
                None
            }
            (_, value) => Some(value),
        };
        if let Some(value) = replacement {
            base.insert(key, value);
        }
    }
}

/// Merge arrays of tables by their `name` key
fn merge_named(base: &mut Vec<toml::Value>, overlay: Vec<toml::Value>) {
    for item in overlay {
        let name = item.get("name").and_then(toml::Value::as_str).map(str::to_owned);
        let existing = name.as_deref().and_then(|n| {
            base.iter_mut()
                .find(|b| b.get("name").and_then(toml::Value::as_str) == Some(n))
        });
        match existing {
            Some(slot) => *slot = item,
            None => base.push(item),
        }
    }
}
