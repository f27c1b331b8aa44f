//! Configuration-driven engines

use std::fs;

use metasync_core::config::{StoreBackend, local_path};
use metasync_core::{SweepOptions, SweepOrchestrator, SyncConfig};
use metasync_model::{CorrelationLinks, Direction, EntityEnvelope};
use metasync_test_utils::{Workspace, seed_glossary};
use pretty_assertions::assert_eq;

const BASE: &str = r#"
[sync]
page_size = 1
user_id = "nightly"

[directions]
glossary = "source_to_destination"

[store]
backend = "destination"

[mapping.name]
source = "name"
destination = "displayName"

[[scopes]]
name = "glossaries"
category = "glossary"
source_type = "AtlasGlossary"
destination_type = "Glossary"

[[scopes.children]]
source_type = "AtlasGlossaryTerm"
destination_type = "GlossaryTerm"
source_relationship = "terms"
destination_relationship = "terms"
"#;

#[test]
fn test_records_live_in_destination_when_configured() {
    let ws = Workspace::new();
    seed_glossary(&ws.source, "G", &["Revenue", "Cost"]);
    let path = ws.write_config(BASE);
    let config = SyncConfig::load_layered(&path).unwrap();
    assert_eq!(config.store.backend, StoreBackend::Destination);

    let engine =
        SweepOrchestrator::from_config(&config, ws.source.clone(), ws.destination.clone()).unwrap();
    let report = engine
        .run(&config.scope("glossaries").unwrap(), &SweepOptions::default())
        .unwrap();

    // A page size of one still reaches every entity
    assert!(report.success());
    assert_eq!(report.created, 3);
    let links = ws.destination.list_links().unwrap();
    assert_eq!(links.len(), 3);
    assert!(
        links
            .iter()
            .all(|r| r.mapping_property("createdBy") == Some("nightly"))
    );
}

#[test]
fn test_local_override_opens_the_reverse_direction() {
    let ws = Workspace::new();
    ws.destination.insert(
        EntityEnvelope::new("Glossary").with_attribute("displayName", "Ops"),
        None,
    );
    let path = ws.write_config(BASE);

    let one_way = SyncConfig::load_layered(&path).unwrap();
    assert_eq!(one_way.direction_for("glossary"), Direction::SourceToDestination);

    fs::write(local_path(&path), "[directions]\nglossary = \"both\"\n").unwrap();
    let config = SyncConfig::load_layered(&path).unwrap();
    assert_eq!(config.direction_for("glossary"), Direction::Both);
    assert_eq!(config.sync.user_id, "nightly");

    let engine =
        SweepOrchestrator::from_config(&config, ws.source.clone(), ws.destination.clone()).unwrap();
    let report = engine
        .run(&config.scope("glossaries").unwrap(), &SweepOptions::default())
        .unwrap();

    assert_eq!(report.created, 1);
    let copy = ws.source.find_by_name("AtlasGlossary", "Ops").unwrap();
    assert_eq!(copy.created_by.as_deref(), Some("nightly"));
}

#[test]
fn test_file_store_persists_between_engines() {
    let ws = Workspace::new();
    seed_glossary(&ws.source, "G", &["Revenue"]);
    let config_text = BASE.replace(
        "backend = \"destination\"",
        "backend = \"file\"\npath = \"state/links.toml\"",
    );
    fs::create_dir_all(ws.path("state")).unwrap();
    let path = ws.write_config(&config_text);
    let config = SyncConfig::load_layered(&path).unwrap();
    let scope = config.scope("glossaries").unwrap();

    {
        let engine =
            SweepOrchestrator::from_config(&config, ws.source.clone(), ws.destination.clone())
                .unwrap();
        engine.run(&scope, &SweepOptions::default()).unwrap();
    }
    assert!(ws.path("state/links.toml").exists());

    let engine =
        SweepOrchestrator::from_config(&config, ws.source.clone(), ws.destination.clone()).unwrap();
    let report = engine.run(&scope, &SweepOptions::default()).unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(engine.records().unwrap().len(), 2);
}

#[test]
fn test_invalid_config_builds_no_engine() {
    let ws = Workspace::new();
    let path = ws.write_config("[sync]\npage_size = 0\n");
    let config = SyncConfig::load_layered(&path).unwrap();

    let result = SweepOrchestrator::from_config(&config, ws.source.clone(), ws.destination.clone());
    assert!(result.is_err());
}
