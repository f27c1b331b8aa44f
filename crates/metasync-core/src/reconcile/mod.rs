//! Entity reconciliation: one entity pair brought back in line
//!
//! The [`EntityReconciler`] turns a change-detector verdict into writes
//! against one of the two systems and the correlation store, translating
//! properties and resolving unique names on the way.

mod reconciler;

pub use reconciler::EntityReconciler;

use crate::config::{ScopeLevel, SyncScope};
use crate::detect::Verdict;
use metasync_model::{CorrelationRecord, Side};

/// Options shared by every reconciliation in a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute verdicts and report intended actions without writing.
    /// Actions are prefixed with "[dry-run] Would ..."
    pub dry_run: bool,
    /// Recorded as creator and updater on written entities and records
    pub user_id: String,
    /// Page size used when listing top-level siblings
    pub page_size: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            user_id: "metasync".to_string(),
            page_size: 100,
        }
    }
}

/// Keys of the parent entity on each side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub source: Option<String>,
    pub destination: Option<String>,
    /// The parent's counterpart is only planned (dry run), not written
    pub pending: bool,
}

impl Anchor {
    pub fn new(source: Option<String>, destination: Option<String>) -> Self {
        Self {
            source,
            destination,
            pending: false,
        }
    }

    pub fn key_on(&self, side: Side) -> Option<&str> {
        match side {
            Side::Source => self.source.as_deref(),
            Side::Destination => self.destination.as_deref(),
        }
    }
}

/// Where in a scope an entity is being reconciled
#[derive(Debug, Clone, Copy)]
pub struct ScopeContext<'a> {
    pub scope: &'a SyncScope,
    pub level: &'a ScopeLevel,
    /// Parent keys; empty at the root level
    pub anchor: &'a Anchor,
}

impl<'a> ScopeContext<'a> {
    /// Context for the root level of a scope
    pub fn root(scope: &'a SyncScope, anchor: &'a Anchor) -> Self {
        Self {
            scope,
            level: &scope.root,
            anchor,
        }
    }
}

/// Result of reconciling one entity pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub verdict: Verdict,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// The record as it stands afterwards, `None` once removed
    pub correlation_record: Option<CorrelationRecord>,
    /// Human-readable description of what was done, or would be
    pub actions: Vec<String>,
}

impl ReconcileOutcome {
    pub(crate) fn new(verdict: Verdict, record: Option<CorrelationRecord>) -> Self {
        Self {
            verdict,
            created: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            correlation_record: record,
            actions: Vec::new(),
        }
    }

    pub(crate) fn unchanged(verdict: Verdict, record: Option<CorrelationRecord>) -> Self {
        Self {
            unchanged: 1,
            ..Self::new(verdict, record)
        }
    }

    pub(crate) fn with_action(mut self, action: String) -> Self {
        self.actions.push(action);
        self
    }

    /// Counterpart key on `side` after reconciliation, if any
    pub fn key_on(&self, side: Side) -> Option<&str> {
        self.correlation_record.as_ref().and_then(|r| r.key_on(side))
    }

    /// Whether any system write happened, or would in a dry run
    pub fn wrote(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}
