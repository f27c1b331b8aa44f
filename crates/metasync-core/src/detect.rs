//! Change detection: which way, if any, an entity must flow
//!
//! Evaluated once per entity per sweep from the correlation record and the
//! two envelopes as currently retrieved. Each side's update timestamp is
//! compared with the stamp last seen on that same side, so the two systems'
//! clocks are never compared with each other. Records without a seen stamp
//! fall back to `last_synchronized_at`. An entity with no update timestamp
//! has not changed since creation.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::correlation::{MAPPING_DESTINATION_SEEN, MAPPING_SOURCE_SEEN};
use metasync_model::{CorrelationRecord, EntityEnvelope, Side};

/// Classification of one entity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Never synchronized; copy from `origin` to the other side
    Create { origin: Side },
    /// The authoritative source changed
    UpdateFromSource,
    /// The authoritative destination changed
    UpdateFromDestination,
    /// Only the copy changed; the owner's content is written back over it
    ReplayAuthoritative,
    /// The copy is gone; recreate it from the owner under the same record
    Recreate,
    /// The owner is gone; delete the copy and the record
    DeleteCounterpart,
    /// Nothing changed; touch the watermark only
    ConfirmOnly,
    /// Both sides are gone; drop the record
    Forget,
}

impl Verdict {
    /// Side this verdict writes to, given the record's ownership
    pub fn target(&self, record: Option<&CorrelationRecord>) -> Option<Side> {
        match self {
            Verdict::Create { origin } => Some(origin.opposite()),
            Verdict::UpdateFromSource => Some(Side::Destination),
            Verdict::UpdateFromDestination => Some(Side::Source),
            Verdict::ReplayAuthoritative | Verdict::Recreate | Verdict::DeleteCounterpart => {
                record.map(CorrelationRecord::copy_side)
            }
            Verdict::ConfirmOnly | Verdict::Forget => None,
        }
    }

    /// Whether the verdict writes content into an existing copy
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Verdict::UpdateFromSource | Verdict::UpdateFromDestination | Verdict::ReplayAuthoritative
        )
    }

    /// Verdicts that change structure rather than content
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Verdict::Create { .. } | Verdict::Recreate | Verdict::DeleteCounterpart | Verdict::Forget
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Create { origin } => write!(f, "create from {}", origin),
            Verdict::UpdateFromSource => write!(f, "update from source"),
            Verdict::UpdateFromDestination => write!(f, "update from destination"),
            Verdict::ReplayAuthoritative => write!(f, "replay authoritative"),
            Verdict::Recreate => write!(f, "recreate"),
            Verdict::DeleteCounterpart => write!(f, "delete counterpart"),
            Verdict::ConfirmOnly => write!(f, "confirm"),
            Verdict::Forget => write!(f, "forget"),
        }
    }
}

/// A verdict plus whether both sides had diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub verdict: Verdict,
    /// Both sides changed since the last sync; the owner's change wins
    pub conflict: bool,
}

impl Detection {
    fn clean(verdict: Verdict) -> Self {
        Self {
            verdict,
            conflict: false,
        }
    }
}

/// Whether an envelope was updated after `since`
pub fn changed_since(envelope: &EntityEnvelope, since: DateTime<Utc>) -> bool {
    envelope.updated_at.is_some_and(|at| at > since)
}

fn seen_property(side: Side) -> &'static str {
    match side {
        Side::Source => MAPPING_SOURCE_SEEN,
        Side::Destination => MAPPING_DESTINATION_SEEN,
    }
}

/// Stamp of `side`'s entity as of the last write or confirmation
pub fn seen_at(record: &CorrelationRecord, side: Side) -> Option<DateTime<Utc>> {
    let raw = record.mapping_property(seen_property(side))?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Remember `envelope`'s own stamp for `side`
///
/// The update stamp is used, or the creation stamp for an entity never
/// updated. Nothing is recorded when the envelope carries neither.
pub fn remember_seen(record: &mut CorrelationRecord, side: Side, envelope: Option<&EntityEnvelope>) {
    if let Some(at) = envelope.and_then(|e| e.updated_at.or(e.created_at)) {
        record.set_mapping_property(
            seen_property(side),
            at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );
    }
}

/// Classify an entity pair
///
/// `source` and `destination` are the envelopes as currently retrieved,
/// `None` when absent on that side.
pub fn detect(
    record: Option<&CorrelationRecord>,
    source: Option<&EntityEnvelope>,
    destination: Option<&EntityEnvelope>,
) -> Detection {
    let Some(record) = record else {
        return Detection::clean(match (source, destination) {
            (Some(_), _) => Verdict::Create {
                origin: Side::Source,
            },
            (None, Some(_)) => Verdict::Create {
                origin: Side::Destination,
            },
            (None, None) => Verdict::Forget,
        });
    };

    let (owner, copy) = match record.owner() {
        Side::Source => (source, destination),
        Side::Destination => (destination, source),
    };

    match (owner, copy) {
        (None, None) => Detection::clean(Verdict::Forget),
        (None, Some(_)) => Detection::clean(Verdict::DeleteCounterpart),
        (Some(_), None) => Detection::clean(Verdict::Recreate),
        (Some(owner), Some(copy)) => {
            let since = |side: Side| seen_at(record, side).unwrap_or(record.last_synchronized_at);
            let owner_changed = changed_since(owner, since(record.owner()));
            let copy_changed = changed_since(copy, since(record.copy_side()));

            if owner_changed {
                let verdict = match record.owner() {
                    Side::Source => Verdict::UpdateFromSource,
                    Side::Destination => Verdict::UpdateFromDestination,
                };
                Detection {
                    verdict,
                    conflict: copy_changed,
                }
            } else if copy_changed {
                Detection::clean(Verdict::ReplayAuthoritative)
            } else {
                Detection::clean(Verdict::ConfirmOnly)
            }
        }
    }
}

/// New `last_synchronized_at` after a successful pass
///
/// Never earlier than the owner's update stamp. The copy's stamp is left
/// out: it comes from the other system's clock, which may run ahead.
pub fn watermark(now: DateTime<Utc>, owner: Option<&EntityEnvelope>) -> DateTime<Utc> {
    owner
        .and_then(|e| e.updated_at)
        .map_or(now, |at| now.max(at))
}
