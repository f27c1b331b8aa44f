//! In-memory metadata catalog with JSON snapshots
//!
//! [`MemoryCatalog`] implements both client traits so the engine can run
//! against a catalog held in memory: as a test double, or from snapshot
//! files for offline reconciliation from the CLI. Every write is recorded in
//! a call log so callers can assert on ordering.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Result;
use metasync_model::{
    ClientError, ClientResult, CorrelationLinks, CorrelationRecord, EntityEnvelope, EntityHeader,
    MetadataClient, ParentLink,
};

/// Kind of write recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Create,
    Update,
    Delete,
}

/// One write issued against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCall {
    pub kind: CallKind,
    /// Key written; for creates, the key assigned
    pub key: String,
    pub type_name: String,
    /// Parent key passed with a create
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntity {
    #[serde(flatten)]
    envelope: EntityEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ParentLink>,
}

/// On-disk snapshot layout
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    system: String,
    key_prefix: String,
    name_field: String,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    entities: Vec<StoredEntity>,
    #[serde(default)]
    links: Vec<CorrelationRecord>,
}

#[derive(Debug, Default)]
struct CatalogState {
    next_id: u64,
    entities: BTreeMap<String, StoredEntity>,
    links: BTreeMap<String, CorrelationRecord>,
    calls: Vec<CatalogCall>,
}

impl CatalogState {
    fn assign_key(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let key = format!("{}-{}", prefix, self.next_id);
            if !self.entities.contains_key(&key) {
                return key;
            }
        }
    }

    /// Keys of `key` and everything beneath it, children first
    fn subtree(&self, key: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for (child, entity) in &self.entities {
            if entity.parent.as_ref().is_some_and(|p| p.key == key) {
                keys.extend(self.subtree(child));
            }
        }
        keys.push(key.to_string());
        keys
    }

    fn remove_subtree(&mut self, key: &str) {
        for k in self.subtree(key) {
            self.entities.remove(&k);
        }
    }
}

/// Metadata catalog held in memory
#[derive(Debug)]
pub struct MemoryCatalog {
    system: String,
    key_prefix: String,
    name_field: String,
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    /// Create an empty catalog
    ///
    /// Keys are assigned as `<key_prefix>-<n>`. `name_field` is the
    /// attribute reported as the name in enumeration headers.
    pub fn new(
        system: impl Into<String>,
        key_prefix: impl Into<String>,
        name_field: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            key_prefix: key_prefix.into(),
            name_field: name_field.into(),
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Empty catalog named like a source system
    pub fn source() -> Self {
        Self::new("source", "src", "name")
    }

    /// Empty catalog named like a destination system
    pub fn destination() -> Self {
        Self::new("destination", "dst", "displayName")
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a catalog from a JSON snapshot
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        let catalog = Self::new(snapshot.system, snapshot.key_prefix, snapshot.name_field);
        {
            let mut state = catalog.state();
            state.next_id = snapshot.next_id;
            for mut entity in snapshot.entities {
                let key = match entity.envelope.key.clone() {
                    Some(key) => key,
                    None => {
                        let key = state.assign_key(&catalog.key_prefix);
                        entity.envelope.key = Some(key.clone());
                        key
                    }
                };
                state.entities.insert(key, entity);
            }
            for link in snapshot.links {
                state.links.insert(link.source_key.clone(), link);
            }
        }
        Ok(catalog)
    }

    /// Write the catalog to a JSON snapshot, atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let state = self.state();
            Snapshot {
                system: self.system.clone(),
                key_prefix: self.key_prefix.clone(),
                name_field: self.name_field.clone(),
                next_id: state.next_id,
                entities: state.entities.values().cloned().collect(),
                links: state.links.values().cloned().collect(),
            }
        };
        let content = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Add an entity without logging a call, returning its key
    ///
    /// The envelope's own key is kept when present.
    pub fn insert(&self, mut envelope: EntityEnvelope, parent: Option<ParentLink>) -> String {
        let mut state = self.state();
        let key = match envelope.key.clone() {
            Some(key) => key,
            None => state.assign_key(&self.key_prefix),
        };
        envelope.key = Some(key.clone());
        envelope.created_at.get_or_insert_with(Utc::now);
        envelope.version.get_or_insert(1);
        state
            .entities
            .insert(key.clone(), StoredEntity { envelope, parent });
        key
    }

    /// Modify an entity in place as an outside user would, stamping it as
    /// updated now
    pub fn edit(&self, key: &str, change: impl FnOnce(&mut EntityEnvelope)) -> ClientResult<()> {
        let mut state = self.state();
        let entity = state
            .entities
            .get_mut(key)
            .ok_or_else(|| ClientError::not_found(key))?;
        change(&mut entity.envelope);
        entity.envelope.updated_at = Some(Utc::now());
        entity.envelope.version = Some(entity.envelope.version.unwrap_or(0) + 1);
        Ok(())
    }

    /// Remove an entity and its descendants without logging a call
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state();
        if !state.entities.contains_key(key) {
            return false;
        }
        state.remove_subtree(key);
        true
    }

    pub fn entity(&self, key: &str) -> Option<EntityEnvelope> {
        self.state().entities.get(key).map(|e| e.envelope.clone())
    }

    pub fn parent_of(&self, key: &str) -> Option<ParentLink> {
        self.state().entities.get(key).and_then(|e| e.parent.clone())
    }

    /// All entities of a type, ordered by key
    pub fn entities_of_type(&self, type_name: &str) -> Vec<EntityEnvelope> {
        self.state()
            .entities
            .values()
            .filter(|e| e.envelope.type_name == type_name)
            .map(|e| e.envelope.clone())
            .collect()
    }

    /// First entity of a type whose name attribute equals `name`
    pub fn find_by_name(&self, type_name: &str, name: &str) -> Option<EntityEnvelope> {
        self.entities_of_type(type_name)
            .into_iter()
            .find(|e| e.str_attribute(&self.name_field) == Some(name))
    }

    pub fn len(&self) -> usize {
        self.state().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes issued through the client interface, in order
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn name_field(&self) -> &str {
        &self.name_field
    }

    fn header(&self, entity: &StoredEntity) -> EntityHeader {
        EntityHeader {
            key: entity.envelope.key_or_default().to_string(),
            type_name: entity.envelope.type_name.clone(),
            name: entity
                .envelope
                .str_attribute(&self.name_field)
                .map(str::to_owned),
            updated_at: entity.envelope.updated_at,
        }
    }
}

impl MetadataClient for MemoryCatalog {
    fn system_name(&self) -> &str {
        &self.system
    }

    fn list_entities_by_type(
        &self,
        type_name: &str,
        offset: usize,
        page_size: usize,
    ) -> ClientResult<Vec<EntityHeader>> {
        let state = self.state();
        Ok(state
            .entities
            .values()
            .filter(|e| e.envelope.type_name == type_name)
            .skip(offset)
            .take(page_size)
            .map(|e| self.header(e))
            .collect())
    }

    fn get_entity(&self, key: &str) -> ClientResult<EntityEnvelope> {
        self.entity(key).ok_or_else(|| ClientError::not_found(key))
    }

    fn get_related_entities(
        &self,
        key: &str,
        relationship: &str,
    ) -> ClientResult<Vec<EntityEnvelope>> {
        let state = self.state();
        if !state.entities.contains_key(key) {
            return Err(ClientError::not_found(key));
        }
        Ok(state
            .entities
            .values()
            .filter(|e| {
                e.parent
                    .as_ref()
                    .is_some_and(|p| p.key == key && p.relationship == relationship)
            })
            .map(|e| e.envelope.clone())
            .collect())
    }

    fn create_entity(
        &self,
        envelope: &EntityEnvelope,
        parent: Option<&ParentLink>,
    ) -> ClientResult<String> {
        let mut state = self.state();
        if let Some(p) = parent
            && !state.entities.contains_key(&p.key)
        {
            return Err(ClientError::not_found(&p.key));
        }

        let key = state.assign_key(&self.key_prefix);
        let mut stored = envelope.clone();
        stored.key = Some(key.clone());
        stored.version = Some(1);
        stored.created_at = Some(Utc::now());
        stored.updated_at = None;

        state.calls.push(CatalogCall {
            kind: CallKind::Create,
            key: key.clone(),
            type_name: stored.type_name.clone(),
            parent: parent.map(|p| p.key.clone()),
        });
        state.entities.insert(
            key.clone(),
            StoredEntity {
                envelope: stored,
                parent: parent.cloned(),
            },
        );
        Ok(key)
    }

    fn update_entity(&self, key: &str, envelope: &EntityEnvelope) -> ClientResult<()> {
        let mut state = self.state();
        let entity = state
            .entities
            .get_mut(key)
            .ok_or_else(|| ClientError::not_found(key))?;

        let current = &mut entity.envelope;
        current.type_name = envelope.type_name.clone();
        current.attributes = envelope.attributes.clone();
        current.updated_by = envelope.updated_by.clone();
        current.updated_at = Some(Utc::now());
        current.version = Some(current.version.unwrap_or(0) + 1);
        let type_name = current.type_name.clone();

        state.calls.push(CatalogCall {
            kind: CallKind::Update,
            key: key.to_string(),
            type_name,
            parent: None,
        });
        Ok(())
    }

    fn delete_entity(&self, key: &str) -> ClientResult<()> {
        let mut state = self.state();
        let type_name = state
            .entities
            .get(key)
            .map(|e| e.envelope.type_name.clone())
            .ok_or_else(|| ClientError::not_found(key))?;

        state.remove_subtree(key);
        state.calls.push(CatalogCall {
            kind: CallKind::Delete,
            key: key.to_string(),
            type_name,
            parent: None,
        });
        Ok(())
    }
}

impl CorrelationLinks for MemoryCatalog {
    fn link_external_id(&self, record: &CorrelationRecord) -> ClientResult<()> {
        self.state()
            .links
            .insert(record.source_key.clone(), record.clone());
        Ok(())
    }

    fn get_linked_external_id(&self, source_key: &str) -> ClientResult<Option<CorrelationRecord>> {
        Ok(self.state().links.get(source_key).cloned())
    }

    fn get_link_by_destination(
        &self,
        destination_key: &str,
    ) -> ClientResult<Option<CorrelationRecord>> {
        Ok(self
            .state()
            .links
            .values()
            .find(|r| r.destination_key.as_deref() == Some(destination_key))
            .cloned())
    }

    fn confirm_synchronized(
        &self,
        source_key: &str,
        at: chrono::DateTime<Utc>,
    ) -> ClientResult<()> {
        let mut state = self.state();
        let record = state
            .links
            .get_mut(source_key)
            .ok_or_else(|| ClientError::not_found(source_key))?;
        record.confirm(at);
        Ok(())
    }

    fn unlink_external_id(&self, source_key: &str) -> ClientResult<()> {
        self.state()
            .links
            .remove(source_key)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(source_key))
    }

    fn list_links(&self) -> ClientResult<Vec<CorrelationRecord>> {
        Ok(self.state().links.values().cloned().collect())
    }
}
