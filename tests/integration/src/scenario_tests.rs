//! Cross-crate scenarios: lineage trees, change events, audit trail

use std::sync::Arc;

use metasync_core::catalog::CallKind;
use metasync_core::{
    AuditEvent, DestinationEvent, EventDisposition, EventKind, MemoryCatalog,
    MemoryCorrelationStore, SweepOptions, SweepOrchestrator, Verdict,
};
use metasync_model::{Direction, EntityEnvelope, ParentLink, Side};
use metasync_test_utils::{
    RecordingAuditSink, glossary_scope, lineage_scope, seed_glossary, source_named,
};
use pretty_assertions::assert_eq;

fn engine(
    source: &Arc<MemoryCatalog>,
    destination: &Arc<MemoryCatalog>,
    audit: &Arc<RecordingAuditSink>,
) -> SweepOrchestrator {
    SweepOrchestrator::new(
        source.clone(),
        destination.clone(),
        Box::new(MemoryCorrelationStore::new()),
    )
    .with_audit(audit.clone())
}

#[test]
fn test_lineage_keeps_inputs_and_outputs_apart() {
    let source = Arc::new(MemoryCatalog::source());
    let destination = Arc::new(MemoryCatalog::destination());
    let audit = Arc::new(RecordingAuditSink::new());
    let process = source.insert(source_named("Process", "nightly_etl"), None);
    source.insert(
        source_named("DataSet", "raw_orders"),
        Some(ParentLink::new(&process, "inputs")),
    );
    source.insert(
        source_named("DataSet", "clean_orders"),
        Some(ParentLink::new(&process, "outputs")),
    );

    let engine = engine(&source, &destination, &audit);
    let report = engine.run(&lineage_scope(), &SweepOptions::default()).unwrap();
    assert!(report.success());
    assert_eq!(report.created, 3);

    let copy = destination.find_by_name("Process", "nightly_etl").unwrap();
    let copy_key = copy.key.unwrap();
    let raw = destination.find_by_name("DataSet", "raw_orders").unwrap();
    let clean = destination.find_by_name("DataSet", "clean_orders").unwrap();
    assert_eq!(
        destination.parent_of(raw.key.as_deref().unwrap()),
        Some(ParentLink::new(&copy_key, "inputs"))
    );
    assert_eq!(
        destination.parent_of(clean.key.as_deref().unwrap()),
        Some(ParentLink::new(&copy_key, "outputs"))
    );
    assert_eq!(audit.named("created").len(), 3);
}

#[test]
fn test_audit_trail_records_every_write() {
    let source = Arc::new(MemoryCatalog::source());
    let destination = Arc::new(MemoryCatalog::destination());
    let audit = Arc::new(RecordingAuditSink::new());
    seed_glossary(&source, "G", &["Revenue"]);
    let engine = engine(&source, &destination, &audit);
    let scope = glossary_scope();
    engine.run(&scope, &SweepOptions::default()).unwrap();

    let term = source.find_by_name("AtlasGlossaryTerm", "Revenue").unwrap();
    let term_key = term.key.unwrap();
    source.remove(&term_key);
    engine.run(&scope, &SweepOptions::default()).unwrap();

    let events = audit.events();
    assert!(events.iter().all(|e| e.scope() == "glossaries"));
    let deleted: Vec<&AuditEvent> = events
        .iter()
        .filter(|e| matches!(e, AuditEvent::Deleted { .. }))
        .collect();
    assert_eq!(deleted.len(), 1);
    assert!(matches!(
        deleted[0],
        AuditEvent::Deleted {
            side: Side::Destination,
            ..
        }
    ));
}

#[test]
fn test_conflicting_edits_keep_owner_content() {
    let source = Arc::new(MemoryCatalog::source());
    let destination = Arc::new(MemoryCatalog::destination());
    let audit = Arc::new(RecordingAuditSink::new());
    seed_glossary(&source, "G", &[]);
    let engine = engine(&source, &destination, &audit);
    let scope = glossary_scope().with_direction(Direction::Both);
    engine.run(&scope, &SweepOptions::default()).unwrap();

    let owner = source.find_by_name("AtlasGlossary", "G").unwrap();
    let copy = destination.find_by_name("Glossary", "G").unwrap();
    source
        .edit(owner.key.as_deref().unwrap(), |e| {
            e.attributes.insert("owner".into(), "finance".into());
        })
        .unwrap();
    destination
        .edit(copy.key.as_deref().unwrap(), |e| {
            e.attributes.insert("owner".into(), "marketing".into());
        })
        .unwrap();

    let report = engine.run(&scope, &SweepOptions::default()).unwrap();
    assert_eq!(report.updated, 1);
    let copy = destination.entity(copy.key.as_deref().unwrap()).unwrap();
    assert_eq!(copy.str_attribute("owner"), Some("finance"));
    assert_eq!(audit.named("conflict").len(), 1);
}

#[test]
fn test_destination_event_applies_outside_a_sweep() {
    let source = Arc::new(MemoryCatalog::source());
    let destination = Arc::new(MemoryCatalog::destination());
    let audit = Arc::new(RecordingAuditSink::new());
    destination.insert(
        EntityEnvelope::new("Glossary").with_attribute("displayName", "Ops"),
        None,
    );
    let engine = engine(&source, &destination, &audit);
    let scope = glossary_scope().with_direction(Direction::Both);
    engine.run(&scope, &SweepOptions::default()).unwrap();

    // The destination owns "Ops"; its edit flows to the source immediately
    let native = destination.find_by_name("Glossary", "Ops").unwrap();
    let native_key = native.key.unwrap();
    destination
        .edit(&native_key, |e| {
            e.attributes.insert("owner".into(), "platform".into());
        })
        .unwrap();
    source.clear_calls();

    let disposition = engine
        .handle_destination_event(&scope, &DestinationEvent::new(&native_key, EventKind::Updated))
        .unwrap();
    let EventDisposition::Applied(outcome) = disposition else {
        panic!("expected the update to apply, got {:?}", disposition);
    };
    assert_eq!(outcome.verdict, Verdict::UpdateFromDestination);
    assert_eq!(source.calls().len(), 1);
    assert_eq!(source.calls()[0].kind, CallKind::Update);
    let copy = source.find_by_name("AtlasGlossary", "Ops").unwrap();
    assert_eq!(copy.str_attribute("owner"), Some("platform"));

    // Deleting it is structural and waits for the sweep
    destination.remove(&native_key);
    let deferred = engine
        .handle_destination_event(&scope, &DestinationEvent::new(&native_key, EventKind::Deleted))
        .unwrap();
    assert_eq!(deferred, EventDisposition::Deferred);
    assert!(source.find_by_name("AtlasGlossary", "Ops").is_some());
}

#[test]
fn test_scopes_do_not_touch_each_others_records() {
    // The same source glossary swept by two scopes of different shape
    let source = Arc::new(MemoryCatalog::source());
    let destination = Arc::new(MemoryCatalog::destination());
    let audit = Arc::new(RecordingAuditSink::new());
    seed_glossary(&source, "G", &["Revenue"]);
    let engine = engine(&source, &destination, &audit);

    let terms = glossary_scope();
    let mut glossaries_only = glossary_scope();
    glossaries_only.name = "glossary-shells".to_string();
    glossaries_only.root.children.clear();

    engine.run(&terms, &SweepOptions::default()).unwrap();
    let report = engine
        .run(&glossaries_only, &SweepOptions::default())
        .unwrap();

    assert!(report.success());
    assert_eq!(report.created + report.deleted, 0);
    assert_eq!(destination.len(), 2);
}
