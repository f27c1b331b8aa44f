//! Audit trail of reconciliation writes
//!
//! Fire-and-forget: a sink never fails and never influences control flow.

use std::fmt;

use metasync_model::Side;

/// Tracing target audit events are emitted under
pub const AUDIT_TARGET: &str = "metasync::audit";

/// One auditable occurrence during a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    Created {
        scope: String,
        side: Side,
        key: String,
        origin_key: String,
        type_name: String,
    },
    Updated {
        scope: String,
        side: Side,
        key: String,
        type_name: String,
    },
    Deleted {
        scope: String,
        side: Side,
        key: String,
    },
    /// A missing copy was recreated under the existing correlation
    Replaced {
        scope: String,
        side: Side,
        previous_key: Option<String>,
        key: String,
    },
    /// Both sides changed; the owner's version was kept
    Conflict {
        scope: String,
        source_key: String,
        owner: Side,
    },
    /// An entity without a usable identifier was skipped
    MissingIdentifier {
        scope: String,
        side: Side,
        type_name: String,
    },
    UnexpectedError {
        scope: String,
        key: String,
        message: String,
    },
}

impl AuditEvent {
    pub fn scope(&self) -> &str {
        match self {
            AuditEvent::Created { scope, .. }
            | AuditEvent::Updated { scope, .. }
            | AuditEvent::Deleted { scope, .. }
            | AuditEvent::Replaced { scope, .. }
            | AuditEvent::Conflict { scope, .. }
            | AuditEvent::MissingIdentifier { scope, .. }
            | AuditEvent::UnexpectedError { scope, .. } => scope,
        }
    }

    /// Short event name, e.g. `created`
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::Created { .. } => "created",
            AuditEvent::Updated { .. } => "updated",
            AuditEvent::Deleted { .. } => "deleted",
            AuditEvent::Replaced { .. } => "replaced",
            AuditEvent::Conflict { .. } => "conflict",
            AuditEvent::MissingIdentifier { .. } => "missing_identifier",
            AuditEvent::UnexpectedError { .. } => "unexpected_error",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::Created {
                side,
                key,
                origin_key,
                type_name,
                ..
            } => write!(f, "created {} {} on {} from {}", type_name, key, side, origin_key),
            AuditEvent::Updated {
                side,
                key,
                type_name,
                ..
            } => write!(f, "updated {} {} on {}", type_name, key, side),
            AuditEvent::Deleted { side, key, .. } => write!(f, "deleted {} on {}", key, side),
            AuditEvent::Replaced {
                side,
                previous_key,
                key,
                ..
            } => match previous_key {
                Some(prev) => write!(f, "replaced {} with {} on {}", prev, key, side),
                None => write!(f, "replaced missing copy with {} on {}", key, side),
            },
            AuditEvent::Conflict {
                source_key, owner, ..
            } => write!(
                f,
                "both sides changed for {}, kept the {} version",
                source_key, owner
            ),
            AuditEvent::MissingIdentifier {
                side, type_name, ..
            } => write!(f, "{} {} has no identifier", side, type_name),
            AuditEvent::UnexpectedError { key, message, .. } => {
                write!(f, "unexpected error on {}: {}", key, message)
            }
        }
    }
}

/// Receiver of audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits every audit event as a `tracing` event under [`AUDIT_TARGET`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event {
            AuditEvent::Conflict { .. } | AuditEvent::MissingIdentifier { .. } => {
                tracing::warn!(
                    target: AUDIT_TARGET,
                    scope = event.scope(),
                    event = event.name(),
                    "{}",
                    event
                );
            }
            AuditEvent::UnexpectedError { .. } => {
                tracing::error!(
                    target: AUDIT_TARGET,
                    scope = event.scope(),
                    event = event.name(),
                    "{}",
                    event
                );
            }
            _ => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    scope = event.scope(),
                    event = event.name(),
                    "{}",
                    event
                );
            }
        }
    }
}
