//! SweepOrchestrator implementation

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use super::guard::{CancellationFlag, SweepGuard};
use super::report::SweepReport;
use crate::Result;
use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::config::{ScopeLevel, SyncConfig, SyncScope};
use crate::correlation::{CorrelationStore, MAPPING_SCOPE};
use crate::detect::{Verdict, detect};
use crate::error::{ClientResultExt, Error, ErrorKind};
use crate::reconcile::{Anchor, EntityReconciler, ReconcileOptions, ReconcileOutcome, ScopeContext};
use crate::translate::{DictionaryMapper, PropertyMapper};
use metasync_model::{
    CorrelationLinks, CorrelationRecord, DestinationClient, EntityEnvelope, MetadataClient, Side,
};

/// Engine-wide settings, usually taken from the `[sync]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    pub page_size: usize,
    pub user_id: String,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            user_id: "metasync".to_string(),
        }
    }
}

/// Options for a single sweep
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// If true, compute verdicts without writing to either system or the
    /// store. Actions will be prefixed with "[dry-run] Would ..."
    pub dry_run: bool,
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A change notification from the destination's change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationEvent {
    pub destination_key: String,
    pub kind: EventKind,
}

impl DestinationEvent {
    pub fn new(destination_key: impl Into<String>, kind: EventKind) -> Self {
        Self {
            destination_key: destination_key.into(),
            kind,
        }
    }
}

/// How a destination event was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Left for the next sweep
    Deferred,
    /// Not part of this scope
    Ignored,
    /// Reconciled immediately
    Applied(ReconcileOutcome),
}

/// Drives full reconciliation passes over sync scopes
///
/// One sweep runs at a time per orchestrator. A second call to
/// [`run`](Self::run) while one is active fails with
/// [`Error::SweepInProgress`], and destination events arriving meanwhile
/// are deferred.
pub struct SweepOrchestrator {
    source: Arc<dyn MetadataClient>,
    destination: Arc<dyn MetadataClient>,
    store: Mutex<Box<dyn CorrelationStore>>,
    mapper: Box<dyn PropertyMapper>,
    audit: Arc<dyn AuditSink>,
    settings: SweepSettings,
    running: AtomicBool,
    cancel: CancellationFlag,
}

impl SweepOrchestrator {
    /// Create an orchestrator with the default mapper and audit sink
    pub fn new(
        source: Arc<dyn MetadataClient>,
        destination: Arc<dyn MetadataClient>,
        store: Box<dyn CorrelationStore>,
    ) -> Self {
        Self {
            source,
            destination,
            store: Mutex::new(store),
            mapper: Box::new(DictionaryMapper::default()),
            audit: Arc::new(TracingAuditSink),
            settings: SweepSettings::default(),
            running: AtomicBool::new(false),
            cancel: CancellationFlag::new(),
        }
    }

    /// Build an orchestrator from configuration
    ///
    /// Opens the configured correlation store; the destination doubles as
    /// the store when the `destination` backend is selected.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration does not
    /// validate, or any error from opening the store.
    pub fn from_config<S, D>(config: &SyncConfig, source: Arc<S>, destination: Arc<D>) -> Result<Self>
    where
        S: MetadataClient + 'static,
        D: DestinationClient + 'static,
    {
        config.validate()?;
        let links: Arc<dyn CorrelationLinks> = destination.clone();
        let store = config.store.open(Some(links))?;

        Ok(Self::new(source, destination, store)
            .with_mapper(Box::new(DictionaryMapper::new(config.mapping.clone())))
            .with_settings(SweepSettings {
                page_size: config.sync.page_size,
                user_id: config.sync.user_id.clone(),
            }))
    }

    pub fn with_mapper(mut self, mapper: Box<dyn PropertyMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_settings(mut self, settings: SweepSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for stopping the current sweep at the next entity boundary
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, Box<dyn CorrelationStore>>> {
        self.store
            .lock()
            .map_err(|_| Error::store("correlation store lock poisoned"))
    }

    /// All correlation records, ordered by source key
    pub fn records(&self) -> Result<Vec<CorrelationRecord>> {
        self.lock_store()?.records()
    }

    fn reconcile_options(&self, options: &SweepOptions) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: options.dry_run,
            user_id: self.settings.user_id.clone(),
            page_size: self.settings.page_size,
        }
    }

    /// Run one full reconciliation pass over `scope`
    ///
    /// # Errors
    ///
    /// Per-entity failures are collected in the report. An error is only
    /// returned when the whole sweep cannot proceed: another sweep is
    /// running, the scope qualifier names nothing, or the store is
    /// unusable.
    pub fn run(&self, scope: &SyncScope, options: &SweepOptions) -> Result<SweepReport> {
        let Some(_guard) = SweepGuard::acquire(&self.running) else {
            return Err(Error::SweepInProgress {
                scope: scope.name.clone(),
            });
        };

        tracing::info!(
            scope = %scope.name,
            direction = %scope.direction,
            dry_run = options.dry_run,
            "Starting sweep"
        );

        let mut store = self.lock_store()?;
        let sweep = Sweep {
            source: &*self.source,
            destination: &*self.destination,
            store: &mut **store,
            mapper: &*self.mapper,
            audit: &*self.audit,
            options: self.reconcile_options(options),
            scope,
            cancel: &self.cancel,
            report: SweepReport::new(&scope.name, options.dry_run),
        };
        let report = sweep.run()?;

        tracing::info!(
            scope = %scope.name,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed(),
            cancelled = report.cancelled,
            "Sweep finished"
        );
        Ok(report)
    }

    /// React to a destination change outside the periodic sweep
    ///
    /// Deferred while a sweep runs. Otherwise content changes of correlated
    /// entities are applied right away; anything structural (creates,
    /// deletes, recreates) is left for the next sweep.
    pub fn handle_destination_event(
        &self,
        scope: &SyncScope,
        event: &DestinationEvent,
    ) -> Result<EventDisposition> {
        let Some(_guard) = SweepGuard::acquire(&self.running) else {
            tracing::debug!(key = %event.destination_key, "Sweep in progress, event deferred");
            return Ok(EventDisposition::Deferred);
        };

        let mut store = self.lock_store()?;
        let record = store.lookup_by_destination(&event.destination_key)?;
        if let Some(r) = &record
            && !in_scope(r, scope)
        {
            return Ok(EventDisposition::Ignored);
        }

        let destination = match event.kind {
            EventKind::Deleted => None,
            _ => fetch(&*self.destination, Side::Destination, &event.destination_key)?,
        };
        let level = destination
            .as_ref()
            .and_then(|e| scope.level_for_type(Side::Destination, &e.type_name));

        let Some(record) = record else {
            return Ok(match level {
                Some(_) => EventDisposition::Deferred,
                None => EventDisposition::Ignored,
            });
        };

        let source = fetch(&*self.source, Side::Source, &record.source_key)?;
        let verdict = detect(Some(&record), source.as_ref(), destination.as_ref()).verdict;
        if verdict.is_structural() {
            tracing::debug!(key = %event.destination_key, %verdict, "Structural change deferred to next sweep");
            return Ok(EventDisposition::Deferred);
        }
        let Some(level) = level else {
            return Ok(EventDisposition::Ignored);
        };

        let options = self.reconcile_options(&SweepOptions::default());
        let anchor = Anchor::default();
        let ctx = ScopeContext {
            scope,
            level,
            anchor: &anchor,
        };
        let outcome = EntityReconciler::new(
            &*self.source,
            &*self.destination,
            &mut **store,
            &*self.mapper,
            &*self.audit,
            &options,
        )
        .reconcile(source.as_ref(), destination.as_ref(), &ctx)?;

        Ok(EventDisposition::Applied(outcome))
    }
}

/// Whether a record belongs to `scope`; unscoped records belong anywhere
fn in_scope(record: &CorrelationRecord, scope: &SyncScope) -> bool {
    record
        .mapping_property(MAPPING_SCOPE)
        .is_none_or(|s| s == scope.name)
}

/// Fetch an entity, mapping not-found to `None`
fn fetch(client: &dyn MetadataClient, side: Side, key: &str) -> Result<Option<EntityEnvelope>> {
    match client.get_entity(key) {
        Ok(entity) => Ok(Some(entity)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(Error::from_client(side, e)),
    }
}

/// Members of one level as enumerated on one side
#[derive(Debug, Default)]
struct Members {
    entities: Vec<EntityEnvelope>,
    /// Listed but could not be fetched
    unresolved: Vec<(String, Error)>,
}

impl Members {
    fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.unresolved.is_empty()
    }
}

/// State of one running sweep
struct Sweep<'a> {
    source: &'a dyn MetadataClient,
    destination: &'a dyn MetadataClient,
    store: &'a mut dyn CorrelationStore,
    mapper: &'a dyn PropertyMapper,
    audit: &'a dyn AuditSink,
    options: ReconcileOptions,
    scope: &'a SyncScope,
    cancel: &'a CancellationFlag,
    report: SweepReport,
}

impl Sweep<'_> {
    fn client(&self, side: Side) -> &dyn MetadataClient {
        match side {
            Side::Source => self.source,
            Side::Destination => self.destination,
        }
    }

    fn run(mut self) -> Result<SweepReport> {
        let scope = self.scope;
        let root = &scope.root;
        let qualifier = scope.qualifier.as_deref();

        // Both sides are enumerated in full before anything is written
        let source = self.enumerate_top(Side::Source, root, qualifier);
        let destination = self.enumerate_top(Side::Destination, root, qualifier);

        if let (Some(q), Ok(s), Ok(d)) = (qualifier, &source, &destination)
            && s.is_empty()
            && d.is_empty()
        {
            return Err(Error::config(format!(
                "'{}' not found on either side of scope '{}'",
                q, scope.name
            )));
        }

        self.level(root, &Anchor::default(), source, destination, true)?;
        self.report.finish();
        Ok(self.report)
    }

    fn check_cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            if !self.report.cancelled {
                tracing::info!(scope = %self.scope.name, "Sweep cancelled at entity boundary");
            }
            self.report.cancelled = true;
        }
        self.report.cancelled
    }

    /// Record a per-entity failure; fatal errors end the sweep
    fn failure(&mut self, key: &str, side: Side, err: Error) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        let side = err.side().unwrap_or(side);
        let kind = err.kind();
        tracing::warn!(scope = %self.scope.name, key, %side, error = %err, "Entity not reconciled");
        if matches!(kind, ErrorKind::Internal | ErrorKind::Rejected) {
            self.audit.record(&AuditEvent::UnexpectedError {
                scope: self.scope.name.clone(),
                key: key.to_string(),
                message: err.to_string(),
            });
        }
        self.report.fail(key, side, kind, err.to_string());
        Ok(())
    }

    fn enumerate_top(
        &self,
        side: Side,
        level: &ScopeLevel,
        qualifier: Option<&str>,
    ) -> Result<Members> {
        let client = self.client(side);
        let type_name = level.type_on(side);
        let page_size = self.options.page_size.max(1);

        let mut headers = Vec::new();
        let mut offset = 0;
        loop {
            let page = client
                .list_entities_by_type(type_name, offset, page_size)
                .on(side)?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            headers.extend(page);
        }

        let mut members = Members::default();
        for header in headers {
            if let Some(q) = qualifier
                && header.name.as_deref() != Some(q)
            {
                continue;
            }
            match client.get_entity(&header.key) {
                Ok(entity) => members.entities.push(entity),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(key = %header.key, %side, "Entity vanished after listing");
                }
                Err(e) => members
                    .unresolved
                    .push((header.key, Error::from_client(side, e))),
            }
        }
        Ok(members)
    }

    fn enumerate_related(&self, side: Side, level: &ScopeLevel, anchor: &Anchor) -> Result<Members> {
        let (Some(parent), Some(relationship)) = (anchor.key_on(side), level.relationship(side))
        else {
            return Ok(Members::default());
        };
        let type_name = level.type_on(side);
        let entities = self
            .client(side)
            .get_related_entities(parent, relationship)
            .on(side)?
            .into_iter()
            .filter(|e| e.type_name == type_name)
            .collect();
        Ok(Members {
            entities,
            unresolved: Vec::new(),
        })
    }

    /// Reconcile one level: members present at the source first, then the
    /// reverse check over destination members nothing accounted for
    fn level(
        &mut self,
        level: &ScopeLevel,
        anchor: &Anchor,
        source: Result<Members>,
        destination: Result<Members>,
        top: bool,
    ) -> Result<()> {
        let mut complete = true;
        let mut seen = BTreeSet::new();

        let source = match source {
            Ok(members) => members,
            Err(e) => {
                complete = false;
                let key = anchor.key_on(Side::Source).unwrap_or(&level.source_type).to_string();
                self.failure(&key, Side::Source, e)?;
                Members::default()
            }
        };
        let destination = match destination {
            Ok(members) => Some(members),
            Err(e) => {
                complete = false;
                let key = anchor
                    .key_on(Side::Destination)
                    .unwrap_or(&level.destination_type)
                    .to_string();
                self.failure(&key, Side::Destination, e)?;
                None
            }
        };

        // Counterparts of entities that could not be fetched are off limits
        for (key, err) in source.unresolved {
            if let Ok(Some(record)) = self.store.lookup_by_source(&key)
                && let Some(dest) = record.destination_key
            {
                seen.insert(dest);
            }
            self.failure(&key, Side::Source, err)?;
        }
        let destination = match destination {
            Some(mut members) => {
                for (key, err) in std::mem::take(&mut members.unresolved) {
                    seen.insert(key.clone());
                    self.failure(&key, Side::Destination, err)?;
                }
                Some(members)
            }
            None => None,
        };

        for entity in &source.entities {
            if top && self.check_cancelled() {
                break;
            }
            self.source_member(level, anchor, entity, &mut seen)?;
        }

        match destination {
            Some(members) if complete && !self.report.cancelled => {
                for entity in &members.entities {
                    if top && self.check_cancelled() {
                        break;
                    }
                    if seen.contains(entity.key_or_default()) {
                        continue;
                    }
                    self.destination_member(level, anchor, entity)?;
                }
            }
            _ => {
                tracing::debug!(
                    scope = %self.scope.name,
                    level = %level.destination_type,
                    "Reverse check skipped"
                );
            }
        }
        Ok(())
    }

    fn source_member(
        &mut self,
        level: &ScopeLevel,
        anchor: &Anchor,
        entity: &EntityEnvelope,
        seen: &mut BTreeSet<String>,
    ) -> Result<()> {
        let key = entity.key_or_default().to_string();
        let record = match self.store.lookup_by_source(&key) {
            Ok(record) => record,
            Err(e) => return self.failure(&key, Side::Source, e),
        };

        if let Some(r) = &record {
            if let Some(dest) = &r.destination_key {
                seen.insert(dest.clone());
            }
            if !in_scope(r, self.scope) {
                tracing::debug!(key = %key, "Correlated under another scope, skipped");
                return Ok(());
            }
        }

        let destination = match record.as_ref().and_then(|r| r.destination_key.as_deref()) {
            Some(dest) => match fetch(self.destination, Side::Destination, dest) {
                Ok(found) => found,
                Err(e) => return self.failure(&key, Side::Destination, e),
            },
            None => None,
        };

        self.reconcile_member(level, anchor, Some(entity), destination.as_ref(), record.as_ref())
    }

    fn destination_member(
        &mut self,
        level: &ScopeLevel,
        anchor: &Anchor,
        entity: &EntityEnvelope,
    ) -> Result<()> {
        let key = entity.key_or_default().to_string();
        let record = match self.store.lookup_by_destination(&key) {
            Ok(record) => record,
            Err(e) => return self.failure(&key, Side::Destination, e),
        };

        if let Some(r) = &record {
            if !in_scope(r, self.scope) {
                return Ok(());
            }
            // Only act when the source entity is really gone, not merely
            // outside this enumeration
            match fetch(self.source, Side::Source, &r.source_key) {
                Ok(None) => {}
                Ok(Some(_)) => {
                    tracing::debug!(key = %key, source_key = %r.source_key, "Source entity lives elsewhere, left alone");
                    return Ok(());
                }
                Err(e) => return self.failure(&key, Side::Source, e),
            }
        }

        self.reconcile_member(level, anchor, None, Some(entity), record.as_ref())
    }

    fn reconcile_member(
        &mut self,
        level: &ScopeLevel,
        anchor: &Anchor,
        source: Option<&EntityEnvelope>,
        destination: Option<&EntityEnvelope>,
        record: Option<&CorrelationRecord>,
    ) -> Result<()> {
        let (key, side) = match (source, destination) {
            (Some(e), _) => (e.key_or_default().to_string(), Side::Source),
            (None, Some(e)) => (e.key_or_default().to_string(), Side::Destination),
            (None, None) => return Ok(()),
        };

        // Children go first when their parent's copy is about to be deleted
        if !level.children.is_empty()
            && detect(record, source, destination).verdict == Verdict::DeleteCounterpart
        {
            let pruning = Anchor::new(
                source.and_then(|e| e.key.clone()),
                destination.and_then(|e| e.key.clone()),
            );
            self.sweep_children(level, &pruning)?;
        }

        let ctx = ScopeContext {
            scope: self.scope,
            level,
            anchor,
        };
        let result = EntityReconciler::new(
            self.source,
            self.destination,
            &mut *self.store,
            self.mapper,
            self.audit,
            &self.options,
        )
        .reconcile(source, destination, &ctx);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return self.failure(&key, side, e),
        };

        let pending = self.options.dry_run && outcome.created > 0;
        let recurse = !level.children.is_empty()
            && !matches!(outcome.verdict, Verdict::DeleteCounterpart | Verdict::Forget)
            && (outcome.correlation_record.is_some() || pending);
        let child_anchor = Anchor {
            source: anchor_key(&outcome, Side::Source, source, pending),
            destination: anchor_key(&outcome, Side::Destination, destination, pending),
            pending,
        };
        self.report.absorb(outcome);

        if recurse {
            self.sweep_children(level, &child_anchor)?;
        }
        Ok(())
    }

    fn sweep_children(&mut self, level: &ScopeLevel, anchor: &Anchor) -> Result<()> {
        for child in &level.children {
            let source = self.enumerate_related(Side::Source, child, anchor);
            let destination = self.enumerate_related(Side::Destination, child, anchor);
            self.level(child, anchor, source, destination, false)?;
        }
        Ok(())
    }
}

/// Parent key for the next level down on `side`: a freshly written copy
/// wins over the envelope that was retrieved. A planned copy has no key yet.
fn anchor_key(
    outcome: &ReconcileOutcome,
    side: Side,
    present: Option<&EntityEnvelope>,
    planned: bool,
) -> Option<String> {
    if outcome.created > 0
        && !planned
        && let Some(key) = outcome.key_on(side)
    {
        return Some(key.to_string());
    }
    present.and_then(|e| e.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::correlation::MemoryCorrelationStore;
    use metasync_model::{Direction, ParentLink};
    use pretty_assertions::assert_eq;

    fn database_scope() -> SyncScope {
        SyncScope::new(
            "databases",
            "assets",
            ScopeLevel::root("hive_db", "Database").with_child(ScopeLevel::child(
                "hive_table",
                "Table",
                "tables",
                "nestedSchema",
            )),
        )
    }

    fn named(type_name: &str, name: &str) -> EntityEnvelope {
        EntityEnvelope::new(type_name).with_attribute("name", name)
    }

    fn engine(source: &Arc<MemoryCatalog>, destination: &Arc<MemoryCatalog>) -> SweepOrchestrator {
        SweepOrchestrator::new(
            source.clone(),
            destination.clone(),
            Box::new(MemoryCorrelationStore::new()),
        )
    }

    #[test]
    fn first_sweep_copies_tree_and_second_is_quiet() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        let db = source.insert(named("hive_db", "sales"), None);
        source.insert(named("hive_table", "orders"), Some(ParentLink::new(&db, "tables")));

        let engine = engine(&source, &destination);
        let first = engine.run(&database_scope(), &SweepOptions::default()).unwrap();
        assert_eq!(first.created, 2);
        assert!(first.success());

        let second = engine.run(&database_scope(), &SweepOptions::default()).unwrap();
        assert_eq!(second.created + second.updated + second.deleted, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn dry_run_plans_children_of_planned_parents() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        let db = source.insert(named("hive_db", "sales"), None);
        source.insert(named("hive_table", "orders"), Some(ParentLink::new(&db, "tables")));

        let engine = engine(&source, &destination);
        let report = engine
            .run(&database_scope(), &SweepOptions { dry_run: true })
            .unwrap();

        assert_eq!(report.created, 2);
        assert!(report.actions.iter().all(|a| a.starts_with("[dry-run] Would")));
        assert!(destination.is_empty());
        assert!(engine.records().unwrap().is_empty());
    }

    #[test]
    fn missing_qualifier_target_is_fatal() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        source.insert(named("hive_db", "sales"), None);

        let scope = database_scope().with_qualifier("hr");
        let err = engine(&source, &destination)
            .run(&scope, &SweepOptions::default())
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(destination.is_empty());
    }

    #[test]
    fn qualifier_limits_sweep_to_one_collection() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        source.insert(named("hive_db", "sales"), None);
        source.insert(named("hive_db", "hr"), None);

        let scope = database_scope().with_qualifier("sales");
        let report = engine(&source, &destination)
            .run(&scope, &SweepOptions::default())
            .unwrap();
        assert_eq!(report.created, 1);
        assert!(destination.find_by_name("Database", "hr").is_none());
    }

    #[test]
    fn cancelled_sweep_stops_and_skips_reverse_check() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        source.insert(named("hive_db", "sales"), None);

        let engine = engine(&source, &destination);
        engine.cancellation().cancel();
        let report = engine.run(&database_scope(), &SweepOptions::default()).unwrap();

        assert!(report.cancelled);
        assert!(!report.success());
        assert_eq!(report.created, 0);
    }

    #[test]
    fn event_during_sweep_is_deferred() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        let engine = engine(&source, &destination);

        let _held = SweepGuard::acquire(&engine.running).unwrap();
        let disposition = engine
            .handle_destination_event(
                &database_scope(),
                &DestinationEvent::new("dst-1", EventKind::Updated),
            )
            .unwrap();
        assert_eq!(disposition, EventDisposition::Deferred);

        let err = engine
            .run(&database_scope(), &SweepOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SweepInProgress { .. }));
    }

    #[test]
    fn destination_edit_event_applies_owner_content() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        source.insert(named("hive_db", "sales"), None);
        let scope = database_scope();

        let engine = engine(&source, &destination);
        engine.run(&scope, &SweepOptions::default()).unwrap();
        let copy = destination.find_by_name("Database", "sales").unwrap();
        let copy_key = copy.key.clone().unwrap();

        destination
            .edit(&copy_key, |e| {
                e.attributes.insert("displayName".into(), "vandalised".into());
            })
            .unwrap();
        let disposition = engine
            .handle_destination_event(&scope, &DestinationEvent::new(&copy_key, EventKind::Updated))
            .unwrap();

        let EventDisposition::Applied(outcome) = disposition else {
            panic!("expected the edit to be applied, got {:?}", disposition);
        };
        assert_eq!(outcome.verdict, Verdict::ReplayAuthoritative);
        assert_eq!(
            destination.entity(&copy_key).unwrap().str_attribute("displayName"),
            Some("sales")
        );
    }

    #[test]
    fn structural_events_wait_for_the_sweep() {
        let source = Arc::new(MemoryCatalog::source());
        let destination = Arc::new(MemoryCatalog::destination());
        let native = destination.insert(
            EntityEnvelope::new("Database").with_attribute("displayName", "ops"),
            None,
        );
        let scope = database_scope().with_direction(Direction::Both);
        let engine = engine(&source, &destination);

        let created = engine
            .handle_destination_event(&scope, &DestinationEvent::new(&native, EventKind::Created))
            .unwrap();
        assert_eq!(created, EventDisposition::Deferred);

        let unknown = engine
            .handle_destination_event(&scope, &DestinationEvent::new("dst-404", EventKind::Updated))
            .unwrap();
        assert_eq!(unknown, EventDisposition::Ignored);
        assert!(source.is_empty());
    }
}
