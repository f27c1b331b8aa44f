//! Catalog seeding helpers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metasync_core::MemoryCatalog;
use metasync_model::{EntityEnvelope, ParentLink};
use tempfile::TempDir;

/// Source-side envelope carrying just a name
pub fn source_named(type_name: &str, name: &str) -> EntityEnvelope {
    EntityEnvelope::new(type_name).with_attribute("name", name)
}

/// Seed `db` with tables, each listing its columns; returns the database key
pub fn seed_database(catalog: &MemoryCatalog, db: &str, tables: &[(&str, &[&str])]) -> String {
    let db_key = catalog.insert(source_named("hive_db", db), None);
    for (table, columns) in tables {
        let table_key = catalog.insert(
            source_named("hive_table", table),
            Some(ParentLink::new(&db_key, "tables")),
        );
        for column in *columns {
            catalog.insert(
                source_named("hive_column", column),
                Some(ParentLink::new(&table_key, "columns")),
            );
        }
    }
    db_key
}

/// Seed a glossary with terms; returns the glossary key
pub fn seed_glossary(catalog: &MemoryCatalog, glossary: &str, terms: &[&str]) -> String {
    let key = catalog.insert(source_named("AtlasGlossary", glossary), None);
    for term in terms {
        catalog.insert(
            source_named("AtlasGlossaryTerm", term),
            Some(ParentLink::new(&key, "terms")),
        );
    }
    key
}

/// A pair of empty catalogs plus a temporary directory for files
///
/// # Example
///
/// ```rust,no_run
/// use metasync_test_utils::{Workspace, seed_glossary};
///
/// let ws = Workspace::new();
/// seed_glossary(&ws.source, "G", &["Revenue", "Cost"]);
/// ws.write_config("[sync]\npage_size = 10\n");
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    pub source: Arc<MemoryCatalog>,
    pub destination: Arc<MemoryCatalog>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            source: Arc::new(MemoryCatalog::source()),
            destination: Arc::new(MemoryCatalog::destination()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `metasync.toml` into the workspace and return its path
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.path("metasync.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Save both catalogs as `source.json` and `destination.json`
    pub fn save_catalogs(&self) {
        self.source.save(&self.path("source.json")).unwrap();
        self.destination.save(&self.path("destination.json")).unwrap();
    }

    /// Reload both catalogs from the snapshot files
    pub fn load_catalogs(&self) -> (MemoryCatalog, MemoryCatalog) {
        (
            MemoryCatalog::load(&self.path("source.json")).unwrap(),
            MemoryCatalog::load(&self.path("destination.json")).unwrap(),
        )
    }
}
