//! EntityReconciler implementation

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ReconcileOptions, ReconcileOutcome, ScopeContext};
use crate::audit::{AuditEvent, AuditSink};
use crate::correlation::{
    CorrelationStore, MAPPING_COPY_NAME, MAPPING_CREATED_BY, MAPPING_OWNER_NAME, MAPPING_SCOPE,
};
use crate::detect::{Verdict, detect, remember_seen, watermark};
use crate::error::ClientResultExt;
use crate::naming::{Sibling, UniqueNameResolver};
use crate::translate::PropertyMapper;
use crate::{Error, Result};
use metasync_model::{
    CorrelationRecord, EntityEnvelope, MetadataClient, ParentLink, Provenance, Side,
};

/// A copy ready to be written on the non-authoritative side
struct PlannedCopy {
    envelope: EntityEnvelope,
    parent: Option<ParentLink>,
    owner_name: Option<String>,
    copy_name: Option<String>,
}

impl PlannedCopy {
    fn label(&self) -> String {
        match &self.copy_name {
            Some(name) => format!("{} '{}'", self.envelope.type_name, name),
            None => self.envelope.type_name.clone(),
        }
    }
}

fn pick<'e>(
    side: Side,
    source: Option<&'e EntityEnvelope>,
    destination: Option<&'e EntityEnvelope>,
) -> Option<&'e EntityEnvelope> {
    match side {
        Side::Source => source,
        Side::Destination => destination,
    }
}

fn missing(record: &CorrelationRecord) -> Error {
    Error::MissingCorrelation {
        key: record.source_key.clone(),
    }
}

/// Reconciles one entity pair at a time
///
/// Borrowed from the sweep for the duration of one entity; it holds no
/// state of its own between calls.
pub struct EntityReconciler<'a> {
    source: &'a dyn MetadataClient,
    destination: &'a dyn MetadataClient,
    store: &'a mut dyn CorrelationStore,
    mapper: &'a dyn PropertyMapper,
    audit: &'a dyn AuditSink,
    options: &'a ReconcileOptions,
}

impl<'a> EntityReconciler<'a> {
    pub fn new(
        source: &'a dyn MetadataClient,
        destination: &'a dyn MetadataClient,
        store: &'a mut dyn CorrelationStore,
        mapper: &'a dyn PropertyMapper,
        audit: &'a dyn AuditSink,
        options: &'a ReconcileOptions,
    ) -> Self {
        Self {
            source,
            destination,
            store,
            mapper,
            audit,
            options,
        }
    }

    fn client(&self, side: Side) -> &'a dyn MetadataClient {
        match side {
            Side::Source => self.source,
            Side::Destination => self.destination,
        }
    }

    fn prefix(&self) -> &'static str {
        if self.options.dry_run { "[dry-run] Would " } else { "" }
    }

    /// Reconcile an entity pair
    ///
    /// `source` and `destination` are the envelopes as currently retrieved,
    /// `None` when the entity is absent on that side.
    ///
    /// # Errors
    ///
    /// Client failures come back tagged with the side they happened on.
    /// No correlation record is written after a failed system write.
    pub fn reconcile(
        &mut self,
        source: Option<&EntityEnvelope>,
        destination: Option<&EntityEnvelope>,
        ctx: &ScopeContext<'_>,
    ) -> Result<ReconcileOutcome> {
        for (side, envelope) in [(Side::Source, source), (Side::Destination, destination)] {
            if let Some(envelope) = envelope
                && envelope.key.is_none()
            {
                warn!(scope = %ctx.scope.name, %side, type_name = %envelope.type_name, "Entity without identifier skipped");
                self.audit.record(&AuditEvent::MissingIdentifier {
                    scope: ctx.scope.name.clone(),
                    side,
                    type_name: envelope.type_name.clone(),
                });
                return Ok(ReconcileOutcome::unchanged(Verdict::ConfirmOnly, None));
            }
        }

        let record = self.find_record(source, destination)?;
        let detection = detect(record.as_ref(), source, destination);
        let verdict = detection.verdict;

        debug!(
            scope = %ctx.scope.name,
            source_key = source.map(EntityEnvelope::key_or_default),
            destination_key = destination.map(EntityEnvelope::key_or_default),
            %verdict,
            "Classified entity"
        );

        if detection.conflict
            && let Some(rec) = &record
        {
            warn!(
                scope = %ctx.scope.name,
                source_key = %rec.source_key,
                owner = %rec.owner(),
                "Both sides changed since last sync, keeping the owner's version"
            );
            self.audit.record(&AuditEvent::Conflict {
                scope: ctx.scope.name.clone(),
                source_key: rec.source_key.clone(),
                owner: rec.owner(),
            });
        }

        if let Some(target) = verdict.target(record.as_ref())
            && !ctx.scope.direction.allows_writes_to(target)
        {
            debug!(scope = %ctx.scope.name, %verdict, %target, "Writes to this side are disabled");
            return Ok(ReconcileOutcome::unchanged(verdict, record));
        }

        match (verdict, record) {
            (Verdict::Create { origin }, _) => {
                let owner = pick(origin, source, destination).ok_or_else(|| {
                    Error::store(format!("nothing to create from on {}", origin))
                })?;
                self.create(origin, owner, ctx)
            }
            (Verdict::Forget, record) => self.forget(record),
            (verdict, Some(record)) => {
                let owner = pick(record.owner(), source, destination);
                let copy = pick(record.copy_side(), source, destination);
                match verdict {
                    Verdict::Recreate => {
                        let owner = owner.ok_or_else(|| missing(&record))?;
                        self.recreate(record, owner, ctx)
                    }
                    Verdict::DeleteCounterpart => self.delete_counterpart(record, ctx),
                    Verdict::ConfirmOnly => self.confirm(record, owner, copy),
                    _ => {
                        let (Some(owner), Some(copy)) = (owner, copy) else {
                            return Err(missing(&record));
                        };
                        self.update(verdict, record, owner, copy, ctx)
                    }
                }
            }
            (_, None) => Err(Error::MissingCorrelation {
                key: source
                    .or(destination)
                    .map(|e| e.key_or_default().to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    fn find_record(
        &self,
        source: Option<&EntityEnvelope>,
        destination: Option<&EntityEnvelope>,
    ) -> Result<Option<CorrelationRecord>> {
        if let Some(key) = source.and_then(|e| e.key.as_deref())
            && let Some(record) = self.store.lookup_by_source(key)?
        {
            return Ok(Some(record));
        }
        match destination.and_then(|e| e.key.as_deref()) {
            Some(key) => self.store.lookup_by_destination(key),
            None => Ok(None),
        }
    }

    /// Existing entities in the namespace a copy lands in on `side`
    fn siblings(&self, side: Side, ctx: &ScopeContext<'_>) -> Result<Vec<Sibling>> {
        let client = self.client(side);
        let Some(relationship) = ctx.level.relationship(side) else {
            let type_name = ctx.level.type_on(side);
            let page_size = self.options.page_size.max(1);
            let mut siblings = Vec::new();
            let mut offset = 0;
            loop {
                let page = client
                    .list_entities_by_type(type_name, offset, page_size)
                    .on(side)?;
                if page.is_empty() {
                    break;
                }
                offset += page.len();
                siblings.extend(
                    page.into_iter()
                        .filter_map(|h| h.name.map(|name| Sibling::new(h.key, name))),
                );
            }
            return Ok(siblings);
        };

        let Some(parent) = ctx.anchor.key_on(side) else {
            return Ok(Vec::new());
        };
        Ok(client
            .get_related_entities(parent, relationship)
            .on(side)?
            .iter()
            .filter_map(|e| {
                let name = self.mapper.name_of(e, side)?;
                Some(Sibling::new(e.key.clone()?, name))
            })
            .collect())
    }

    /// Translate the owner and pick a unique name for its copy
    ///
    /// `None` when the copy's parent has no counterpart to attach to.
    fn plan_copy(
        &self,
        owner_side: Side,
        owner: &EntityEnvelope,
        ctx: &ScopeContext<'_>,
    ) -> Result<Option<PlannedCopy>> {
        let target = owner_side.opposite();
        let parent = match ctx.level.relationship(target) {
            None => None,
            Some(relationship) => match ctx.anchor.key_on(target) {
                Some(key) => Some(ParentLink::new(key, relationship)),
                None if self.options.dry_run && ctx.anchor.pending => None,
                None => {
                    warn!(
                        scope = %ctx.scope.name,
                        key = owner.key_or_default(),
                        %target,
                        "Parent has no counterpart, child not copied"
                    );
                    return Ok(None);
                }
            },
        };

        let mut envelope = self
            .mapper
            .translate(owner, owner_side, &ctx.level.type_hint());
        envelope.created_by = Some(self.options.user_id.clone());

        let owner_name = self.mapper.name_of(owner, owner_side).map(str::to_owned);
        let copy_name = match &owner_name {
            Some(name) => {
                let siblings = self.siblings(target, ctx)?;
                let resolved = UniqueNameResolver::resolve(name, &siblings);
                if &resolved != name {
                    debug!(candidate = %name, %resolved, "Name collision resolved");
                }
                envelope.attributes.insert(
                    self.mapper.name_field(target).to_string(),
                    Value::String(resolved.clone()),
                );
                Some(resolved)
            }
            None => None,
        };

        Ok(Some(PlannedCopy {
            envelope,
            parent,
            owner_name,
            copy_name,
        }))
    }

    /// Provenance of the source-side entity of a freshly written pair
    fn source_provenance(
        &self,
        owner_side: Side,
        owner: &EntityEnvelope,
        copy: &EntityEnvelope,
        now: DateTime<Utc>,
    ) -> Provenance {
        match owner_side {
            Side::Source => Provenance::of(owner),
            Side::Destination => Provenance {
                type_name: copy.type_name.clone(),
                version: Some(1),
                created_by: Some(self.options.user_id.clone()),
                created_at: Some(now),
                updated_by: None,
                updated_at: None,
            },
        }
    }

    fn remember_names(
        record: &mut CorrelationRecord,
        owner_name: Option<&str>,
        copy_name: Option<&str>,
    ) {
        if let Some(name) = owner_name {
            record.set_mapping_property(MAPPING_OWNER_NAME, name);
        }
        if let Some(name) = copy_name {
            record.set_mapping_property(MAPPING_COPY_NAME, name);
        }
    }

    /// Remember both sides' own stamps on the record
    fn remember_stamps(
        record: &mut CorrelationRecord,
        owner: &EntityEnvelope,
        copy: Option<&EntityEnvelope>,
    ) {
        let owner_side = record.owner();
        remember_seen(record, owner_side, Some(owner));
        remember_seen(record, owner_side.opposite(), copy);
    }

    /// Read back a copy just written, for the stamp its system gave it
    ///
    /// The write already happened, so a failed read only costs the stamp.
    fn read_back(&self, side: Side, key: &str) -> Option<EntityEnvelope> {
        match self.client(side).get_entity(key) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                debug!(%side, key, error = %e, "Could not read back written copy");
                None
            }
        }
    }

    /// Store the record for a freshly written copy
    ///
    /// `previous` is the record being replaced, if any. When the new record
    /// cannot be stored the previous one is put back and the fresh copy is
    /// removed, so the next sweep starts from the state this one found.
    fn commit_copy(
        &mut self,
        previous: Option<&CorrelationRecord>,
        record: &CorrelationRecord,
        copy_side: Side,
        copy_key: &str,
    ) -> Result<()> {
        let moved = previous.filter(|p| p.source_key != record.source_key);
        if let Some(p) = moved {
            self.store.delete(&p.source_key)?;
        }
        let Err(e) = self.store.upsert(record.clone()) else {
            return Ok(());
        };

        if let Some(p) = moved
            && let Err(restore) = self.store.upsert(p.clone())
        {
            warn!(source_key = %p.source_key, error = %restore, "Could not restore correlation record");
        }
        if let Err(cleanup) = self.client(copy_side).delete_entity(copy_key) {
            warn!(%copy_side, key = copy_key, error = %cleanup, "Could not remove unrecorded copy");
        }
        Err(e)
    }

    fn create(
        &mut self,
        origin: Side,
        owner: &EntityEnvelope,
        ctx: &ScopeContext<'_>,
    ) -> Result<ReconcileOutcome> {
        let verdict = Verdict::Create { origin };
        let target = origin.opposite();
        let owner_key = owner.key_or_default().to_string();

        let Some(plan) = self.plan_copy(origin, owner, ctx)? else {
            return Ok(ReconcileOutcome::unchanged(verdict, None));
        };

        if self.options.dry_run {
            return Ok(ReconcileOutcome {
                created: 1,
                ..ReconcileOutcome::new(verdict, None)
            }
            .with_action(format!(
                "{}create {} on {} from {}",
                self.prefix(),
                plan.label(),
                target,
                owner_key
            )));
        }

        let new_key = self
            .client(target)
            .create_entity(&plan.envelope, plan.parent.as_ref())
            .on(target)?;

        let now = Utc::now();
        let written = self.read_back(target, &new_key);
        let (source_key, destination_key) = match origin {
            Side::Source => (owner_key.clone(), new_key.clone()),
            Side::Destination => (new_key.clone(), owner_key.clone()),
        };
        let mut record = CorrelationRecord::new(
            source_key,
            destination_key,
            origin,
            self.source_provenance(origin, owner, &plan.envelope, now),
            watermark(now, Some(owner)),
        );
        record.set_mapping_property(MAPPING_CREATED_BY, &self.options.user_id);
        record.set_mapping_property(MAPPING_SCOPE, &ctx.scope.name);
        Self::remember_names(
            &mut record,
            plan.owner_name.as_deref(),
            plan.copy_name.as_deref(),
        );
        Self::remember_stamps(&mut record, owner, written.as_ref());
        self.commit_copy(None, &record, target, &new_key)?;

        info!(
            scope = %ctx.scope.name,
            source_key = %record.source_key,
            destination_key = %new_key,
            %verdict,
            "Created counterpart"
        );
        self.audit.record(&AuditEvent::Created {
            scope: ctx.scope.name.clone(),
            side: target,
            key: new_key.clone(),
            origin_key: owner_key,
            type_name: plan.envelope.type_name.clone(),
        });

        Ok(ReconcileOutcome {
            created: 1,
            ..ReconcileOutcome::new(verdict, Some(record))
        }
        .with_action(format!("Created {} on {} ({})", plan.label(), target, new_key)))
    }

    /// Recreate a vanished copy under the existing record
    fn recreate(
        &mut self,
        record: CorrelationRecord,
        owner: &EntityEnvelope,
        ctx: &ScopeContext<'_>,
    ) -> Result<ReconcileOutcome> {
        let owner_side = record.owner();
        let copy_side = record.copy_side();
        let previous = record.key_on(copy_side).map(str::to_owned);

        let Some(plan) = self.plan_copy(owner_side, owner, ctx)? else {
            return Ok(ReconcileOutcome::unchanged(Verdict::Recreate, Some(record)));
        };

        if self.options.dry_run {
            return Ok(ReconcileOutcome {
                created: 1,
                ..ReconcileOutcome::new(Verdict::Recreate, Some(record.clone()))
            }
            .with_action(format!(
                "{}recreate {} on {} for {}",
                self.prefix(),
                plan.label(),
                copy_side,
                owner.key_or_default()
            )));
        }

        let new_key = self
            .client(copy_side)
            .create_entity(&plan.envelope, plan.parent.as_ref())
            .on(copy_side)?;

        let now = Utc::now();
        let written = self.read_back(copy_side, &new_key);
        let mut updated = record.clone();
        if copy_side == Side::Source {
            // The record is keyed by source key, so it moves
            updated.source = self.source_provenance(owner_side, owner, &plan.envelope, now);
        }
        updated.set_key_on(copy_side, &new_key);
        updated.confirm(watermark(now, Some(owner)));
        Self::remember_names(
            &mut updated,
            plan.owner_name.as_deref(),
            plan.copy_name.as_deref(),
        );
        Self::remember_stamps(&mut updated, owner, written.as_ref());
        self.commit_copy(Some(&record), &updated, copy_side, &new_key)?;

        info!(
            scope = %ctx.scope.name,
            source_key = %updated.source_key,
            destination_key = updated.destination_key.as_deref().unwrap_or_default(),
            verdict = %Verdict::Recreate,
            "Recreated missing copy"
        );
        self.audit.record(&AuditEvent::Replaced {
            scope: ctx.scope.name.clone(),
            side: copy_side,
            previous_key: previous,
            key: new_key.clone(),
        });

        Ok(ReconcileOutcome {
            created: 1,
            ..ReconcileOutcome::new(Verdict::Recreate, Some(updated))
        }
        .with_action(format!(
            "Recreated {} on {} ({})",
            plan.label(),
            copy_side,
            new_key
        )))
    }

    /// Write the owner's content over the copy
    fn update(
        &mut self,
        verdict: Verdict,
        record: CorrelationRecord,
        owner: &EntityEnvelope,
        copy: &EntityEnvelope,
        ctx: &ScopeContext<'_>,
    ) -> Result<ReconcileOutcome> {
        let owner_side = record.owner();
        let copy_side = record.copy_side();
        let copy_key = copy
            .key
            .clone()
            .or_else(|| record.key_on(copy_side).map(str::to_owned))
            .ok_or_else(|| missing(&record))?;

        let mut envelope = self
            .mapper
            .translate(owner, owner_side, &ctx.level.type_hint());
        envelope.updated_by = Some(self.options.user_id.clone());

        // The copy is only renamed when the owner's name changed, so a
        // suffix assigned at creation survives content updates
        let owner_name = self.mapper.name_of(owner, owner_side).map(str::to_owned);
        let copy_name = match owner_name.as_deref() {
            Some(name) if record.mapping_property(MAPPING_OWNER_NAME) != Some(name) => {
                let siblings = self.siblings(copy_side, ctx)?;
                Some(UniqueNameResolver::resolve_rename(name, &siblings, &copy_key))
            }
            Some(name) => Some(
                record
                    .mapping_property(MAPPING_COPY_NAME)
                    .or_else(|| self.mapper.name_of(copy, copy_side))
                    .unwrap_or(name)
                    .to_string(),
            ),
            None => None,
        };
        if let Some(name) = &copy_name {
            envelope.attributes.insert(
                self.mapper.name_field(copy_side).to_string(),
                Value::String(name.clone()),
            );
        }

        let label = match &copy_name {
            Some(name) => format!("{} '{}'", envelope.type_name, name),
            None => envelope.type_name.clone(),
        };

        if self.options.dry_run {
            return Ok(ReconcileOutcome {
                updated: 1,
                ..ReconcileOutcome::new(verdict, Some(record))
            }
            .with_action(format!(
                "{}update {} on {} ({})",
                self.prefix(),
                label,
                copy_side,
                copy_key
            )));
        }

        match self.client(copy_side).update_entity(&copy_key, &envelope) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(scope = %ctx.scope.name, key = %copy_key, "Copy vanished during update, recreating");
                return self.recreate(record, owner, ctx);
            }
            Err(e) => return Err(Error::from_client(copy_side, e)),
        }

        let written = self.read_back(copy_side, &copy_key);
        let mut current = self
            .store
            .lookup_by_source(&record.source_key)?
            .ok_or_else(|| missing(&record))?;
        current.confirm(watermark(Utc::now(), Some(owner)));
        if owner_side == Side::Source {
            current.source = Provenance::of(owner);
        }
        Self::remember_names(&mut current, owner_name.as_deref(), copy_name.as_deref());
        Self::remember_stamps(&mut current, owner, written.as_ref());
        self.store.upsert(current.clone())?;

        info!(
            scope = %ctx.scope.name,
            source_key = %current.source_key,
            destination_key = current.destination_key.as_deref().unwrap_or_default(),
            %verdict,
            "Updated copy"
        );
        self.audit.record(&AuditEvent::Updated {
            scope: ctx.scope.name.clone(),
            side: copy_side,
            key: copy_key.clone(),
            type_name: envelope.type_name.clone(),
        });

        Ok(ReconcileOutcome {
            updated: 1,
            ..ReconcileOutcome::new(verdict, Some(current))
        }
        .with_action(format!("Updated {} on {} ({})", label, copy_side, copy_key)))
    }

    /// Delete the copy of an entity whose owner is gone
    fn delete_counterpart(
        &mut self,
        record: CorrelationRecord,
        ctx: &ScopeContext<'_>,
    ) -> Result<ReconcileOutcome> {
        let verdict = Verdict::DeleteCounterpart;
        let copy_side = record.copy_side();
        let copy_key = record
            .key_on(copy_side)
            .map(str::to_owned)
            .ok_or_else(|| missing(&record))?;

        if self.options.dry_run {
            return Ok(ReconcileOutcome {
                deleted: 1,
                ..ReconcileOutcome::new(verdict, Some(record))
            }
            .with_action(format!(
                "{}delete {} on {}",
                self.prefix(),
                copy_key,
                copy_side
            )));
        }

        match self.client(copy_side).delete_entity(&copy_key) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(key = %copy_key, "Copy already gone");
            }
            Err(e) => return Err(Error::from_client(copy_side, e)),
        }
        self.store.delete(&record.source_key)?;

        info!(
            scope = %ctx.scope.name,
            source_key = %record.source_key,
            destination_key = record.destination_key.as_deref().unwrap_or_default(),
            %verdict,
            "Deleted copy of removed owner"
        );
        self.audit.record(&AuditEvent::Deleted {
            scope: ctx.scope.name.clone(),
            side: copy_side,
            key: copy_key.clone(),
        });

        Ok(ReconcileOutcome {
            deleted: 1,
            ..ReconcileOutcome::new(verdict, None)
        }
        .with_action(format!("Deleted {} on {}", copy_key, copy_side)))
    }

    fn confirm(
        &mut self,
        mut record: CorrelationRecord,
        owner: Option<&EntityEnvelope>,
        copy: Option<&EntityEnvelope>,
    ) -> Result<ReconcileOutcome> {
        if !self.options.dry_run {
            record.confirm(watermark(Utc::now(), owner));
            if let Some(owner) = owner {
                Self::remember_stamps(&mut record, owner, copy);
            }
            self.store.upsert(record.clone())?;
        }
        Ok(ReconcileOutcome::unchanged(Verdict::ConfirmOnly, Some(record)))
    }

    fn forget(&mut self, record: Option<CorrelationRecord>) -> Result<ReconcileOutcome> {
        let Some(record) = record else {
            return Ok(ReconcileOutcome::unchanged(Verdict::Forget, None));
        };
        if !self.options.dry_run {
            self.store.delete(&record.source_key)?;
            debug!(source_key = %record.source_key, "Both sides gone, record dropped");
        }
        let action = if self.options.dry_run {
            format!("[dry-run] Would forget correlation for {}", record.source_key)
        } else {
            format!("Forgot correlation for {}", record.source_key)
        };
        Ok(ReconcileOutcome::unchanged(Verdict::Forget, None).with_action(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::catalog::MemoryCatalog;
    use crate::config::{ScopeLevel, SyncScope};
    use crate::correlation::MemoryCorrelationStore;
    use crate::reconcile::Anchor;
    use crate::translate::DictionaryMapper;
    use metasync_model::Direction;
    use pretty_assertions::assert_eq;

    /// Memory store whose next upserts can be made to fail
    #[derive(Default)]
    struct TestStore {
        inner: MemoryCorrelationStore,
        failing_upserts: usize,
    }

    impl TestStore {
        fn is_empty(&self) -> bool {
            self.inner.is_empty()
        }
    }

    impl CorrelationStore for TestStore {
        fn lookup_by_source(&self, source_key: &str) -> Result<Option<CorrelationRecord>> {
            self.inner.lookup_by_source(source_key)
        }

        fn lookup_by_destination(&self, destination_key: &str) -> Result<Option<CorrelationRecord>> {
            self.inner.lookup_by_destination(destination_key)
        }

        fn upsert(&mut self, record: CorrelationRecord) -> Result<()> {
            if self.failing_upserts > 0 {
                self.failing_upserts -= 1;
                return Err(Error::store("disk full"));
            }
            self.inner.upsert(record)
        }

        fn delete(&mut self, source_key: &str) -> Result<Option<CorrelationRecord>> {
            self.inner.delete(source_key)
        }

        fn records(&self) -> Result<Vec<CorrelationRecord>> {
            self.inner.records()
        }
    }

    struct Fixture {
        source: MemoryCatalog,
        destination: MemoryCatalog,
        store: TestStore,
        mapper: DictionaryMapper,
        options: ReconcileOptions,
        scope: SyncScope,
    }

    impl Fixture {
        fn new(direction: Direction) -> Self {
            Self {
                source: MemoryCatalog::source(),
                destination: MemoryCatalog::destination(),
                store: TestStore::default(),
                mapper: DictionaryMapper::default(),
                options: ReconcileOptions::default(),
                scope: SyncScope::new(
                    "glossaries",
                    "glossary",
                    ScopeLevel::root("glossary", "Glossary"),
                )
                .with_direction(direction),
            }
        }

        fn run(
            &mut self,
            source: Option<&EntityEnvelope>,
            destination: Option<&EntityEnvelope>,
        ) -> Result<ReconcileOutcome> {
            let anchor = Anchor::default();
            let ctx = ScopeContext::root(&self.scope, &anchor);
            EntityReconciler::new(
                &self.source,
                &self.destination,
                &mut self.store,
                &self.mapper,
                &TracingAuditSink,
                &self.options,
            )
            .reconcile(source, destination, &ctx)
        }

        fn glossary(&self, name: &str) -> EntityEnvelope {
            let key = self
                .source
                .insert(EntityEnvelope::new("glossary").with_attribute("name", name), None);
            self.source.entity(&key).unwrap()
        }
    }

    #[test]
    fn create_links_owner_and_copy() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");

        let outcome = fx.run(Some(&g), None).unwrap();

        assert_eq!(outcome.created, 1);
        let record = outcome.correlation_record.unwrap();
        assert!(record.owned_by_source());
        assert_eq!(record.mapping_property(MAPPING_SCOPE), Some("glossaries"));
        assert_eq!(record.mapping_property(MAPPING_COPY_NAME), Some("Finance"));

        let copy = fx
            .destination
            .entity(record.destination_key.as_deref().unwrap())
            .unwrap();
        assert_eq!(copy.type_name, "Glossary");
        assert_eq!(copy.str_attribute("displayName"), Some("Finance"));
    }

    #[test]
    fn create_resolves_name_collisions_on_target() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        fx.destination.insert(
            EntityEnvelope::new("Glossary").with_attribute("displayName", "Finance"),
            None,
        );
        let g = fx.glossary("Finance");

        let outcome = fx.run(Some(&g), None).unwrap();
        let record = outcome.correlation_record.unwrap();
        assert_eq!(record.mapping_property(MAPPING_COPY_NAME), Some("Finance (1)"));
        assert_eq!(record.mapping_property(MAPPING_OWNER_NAME), Some("Finance"));
    }

    #[test]
    fn disabled_direction_leaves_entity_untouched() {
        let mut fx = Fixture::new(Direction::DestinationToSource);
        let g = fx.glossary("Finance");

        let outcome = fx.run(Some(&g), None).unwrap();
        assert_eq!(outcome.unchanged, 1);
        assert!(fx.destination.is_empty());
        assert!(fx.store.is_empty());
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        fx.options.dry_run = true;
        let g = fx.glossary("Finance");

        let outcome = fx.run(Some(&g), None).unwrap();
        assert_eq!(outcome.created, 1);
        assert!(outcome.actions[0].starts_with("[dry-run] Would create"));
        assert!(fx.destination.is_empty());
        assert!(fx.store.is_empty());
    }

    #[test]
    fn update_keeps_suffixed_copy_name() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        fx.destination.insert(
            EntityEnvelope::new("Glossary").with_attribute("displayName", "Finance"),
            None,
        );
        let g = fx.glossary("Finance");
        let record = fx.run(Some(&g), None).unwrap().correlation_record.unwrap();
        let copy_key = record.destination_key.clone().unwrap();

        fx.source
            .edit(g.key_or_default(), |e| {
                e.attributes.insert("owner".into(), "alice".into());
            })
            .unwrap();
        let g = fx.source.entity(g.key_or_default()).unwrap();
        let copy = fx.destination.entity(&copy_key).unwrap();

        let outcome = fx.run(Some(&g), Some(&copy)).unwrap();
        assert_eq!(outcome.verdict, Verdict::UpdateFromSource);

        let copy = fx.destination.entity(&copy_key).unwrap();
        assert_eq!(copy.str_attribute("displayName"), Some("Finance (1)"));
        assert_eq!(copy.str_attribute("owner"), Some("alice"));
    }

    #[test]
    fn rename_reresolves_excluding_the_copy_itself() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");
        let record = fx.run(Some(&g), None).unwrap().correlation_record.unwrap();
        let copy_key = record.destination_key.clone().unwrap();

        fx.source
            .edit(g.key_or_default(), |e| {
                e.attributes.insert("name".into(), "Treasury".into());
            })
            .unwrap();
        let g = fx.source.entity(g.key_or_default()).unwrap();
        let copy = fx.destination.entity(&copy_key).unwrap();

        fx.run(Some(&g), Some(&copy)).unwrap();
        let copy = fx.destination.entity(&copy_key).unwrap();
        assert_eq!(copy.str_attribute("displayName"), Some("Treasury"));
        let record = fx.store.lookup_by_source(g.key_or_default()).unwrap().unwrap();
        assert_eq!(record.mapping_property(MAPPING_OWNER_NAME), Some("Treasury"));
    }

    #[test]
    fn vanished_copy_during_update_is_recreated() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");
        let record = fx.run(Some(&g), None).unwrap().correlation_record.unwrap();
        let copy_key = record.destination_key.clone().unwrap();
        let stale_copy = fx.destination.entity(&copy_key).unwrap();

        fx.source
            .edit(g.key_or_default(), |e| {
                e.attributes.insert("owner".into(), "bob".into());
            })
            .unwrap();
        fx.destination.remove(&copy_key);
        let g = fx.source.entity(g.key_or_default()).unwrap();

        let outcome = fx.run(Some(&g), Some(&stale_copy)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Recreate);
        assert_eq!(outcome.created, 1);
        assert_ne!(outcome.key_on(Side::Destination), Some(copy_key.as_str()));
    }

    #[test]
    fn delete_counterpart_tolerates_missing_copy() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");
        let record = fx.run(Some(&g), None).unwrap().correlation_record.unwrap();
        let copy_key = record.destination_key.clone().unwrap();
        let copy = fx.destination.entity(&copy_key).unwrap();
        fx.destination.remove(&copy_key);

        let outcome = fx.run(None, Some(&copy)).unwrap();
        assert_eq!(outcome.verdict, Verdict::DeleteCounterpart);
        assert_eq!(outcome.deleted, 1);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn destination_owned_copy_is_recreated_at_source() {
        let mut fx = Fixture::new(Direction::Both);
        let native = fx.destination.insert(
            EntityEnvelope::new("Glossary").with_attribute("displayName", "Ops"),
            None,
        );
        let native = fx.destination.entity(&native).unwrap();

        let record = fx.run(None, Some(&native)).unwrap().correlation_record.unwrap();
        assert_eq!(record.owner(), Side::Destination);
        let first_source_key = record.source_key.clone();
        fx.source.remove(&first_source_key);

        let outcome = fx.run(None, Some(&native)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Recreate);
        let record = outcome.correlation_record.unwrap();
        assert_ne!(record.source_key, first_source_key);
        assert_eq!(record.owner(), Side::Destination);
        assert!(fx.store.lookup_by_source(&first_source_key).unwrap().is_none());
        assert_eq!(
            fx.source.entity(&record.source_key).unwrap().str_attribute("name"),
            Some("Ops")
        );
    }

    #[test]
    fn failed_record_write_removes_the_fresh_copy() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");
        fx.store.failing_upserts = 1;

        let err = fx.run(Some(&g), None).unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
        assert!(fx.destination.is_empty());
        assert!(fx.store.is_empty());

        // The next pass starts clean and creates exactly one copy
        let outcome = fx.run(Some(&g), None).unwrap();
        assert_eq!(outcome.created, 1);
        assert_eq!(fx.destination.len(), 1);
    }

    #[test]
    fn failed_record_move_restores_the_old_record() {
        let mut fx = Fixture::new(Direction::Both);
        let native = fx.destination.insert(
            EntityEnvelope::new("Glossary").with_attribute("displayName", "Ops"),
            None,
        );
        let native = fx.destination.entity(&native).unwrap();
        let record = fx.run(None, Some(&native)).unwrap().correlation_record.unwrap();
        let first_source_key = record.source_key.clone();
        fx.source.remove(&first_source_key);

        fx.store.failing_upserts = 1;
        let err = fx.run(None, Some(&native)).unwrap_err();
        assert!(matches!(err, Error::Store { .. }));

        let kept = fx.store.lookup_by_source(&first_source_key).unwrap().unwrap();
        assert_eq!(kept.destination_key, record.destination_key);
        assert!(fx.source.is_empty());

        let outcome = fx.run(None, Some(&native)).unwrap();
        assert_eq!(outcome.verdict, Verdict::Recreate);
        assert_eq!(fx.source.len(), 1);
    }

    #[test]
    fn written_copy_stamp_is_remembered() {
        let mut fx = Fixture::new(Direction::SourceToDestination);
        let g = fx.glossary("Finance");
        let record = fx.run(Some(&g), None).unwrap().correlation_record.unwrap();

        let copy = fx
            .destination
            .entity(record.destination_key.as_deref().unwrap())
            .unwrap();
        let stored = fx.store.lookup_by_source(g.key_or_default()).unwrap().unwrap();
        assert_eq!(
            crate::detect::seen_at(&stored, Side::Destination),
            copy.created_at
        );
    }
}
