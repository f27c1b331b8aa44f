//! Canonical scope shapes used across the test suites

use metasync_core::{ScopeLevel, SyncScope};

/// Databases, their tables, and the tables' columns
///
/// `hive_db -tables-> hive_table -columns-> hive_column` at the source,
/// `Database -nestedSchema-> Table -columns-> Column` at the destination.
pub fn database_scope() -> SyncScope {
    SyncScope::new(
        "databases",
        "assets",
        ScopeLevel::root("hive_db", "Database").with_child(
            ScopeLevel::child("hive_table", "Table", "tables", "nestedSchema").with_child(
                ScopeLevel::child("hive_column", "Column", "columns", "columns"),
            ),
        ),
    )
}

/// Glossaries and their terms
pub fn glossary_scope() -> SyncScope {
    SyncScope::new(
        "glossaries",
        "glossary",
        ScopeLevel::root("AtlasGlossary", "Glossary").with_child(ScopeLevel::child(
            "AtlasGlossaryTerm",
            "GlossaryTerm",
            "terms",
            "terms",
        )),
    )
}

/// Processes and the datasets they consume and produce
pub fn lineage_scope() -> SyncScope {
    SyncScope::new(
        "lineage",
        "lineage",
        ScopeLevel::root("Process", "Process")
            .with_child(ScopeLevel::child("DataSet", "DataSet", "inputs", "inputs"))
            .with_child(ScopeLevel::child("DataSet", "DataSet", "outputs", "outputs")),
    )
}
