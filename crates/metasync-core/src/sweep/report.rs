//! Sweep reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::reconcile::ReconcileOutcome;
use metasync_model::Side;

/// One entity that could not be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub key: String,
    pub side: Side,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Tally of one sweep
///
/// A sweep always completes with a report; per-entity errors land in
/// `failures` instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub scope: String,
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failures: Vec<SweepFailure>,
    /// Actions taken, or planned in a dry run
    pub actions: Vec<String>,
    /// The sweep stopped early at an entity boundary
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SweepReport {
    pub fn new(scope: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scope: scope.into(),
            dry_run,
            created: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            failures: Vec::new(),
            actions: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// No failures and not cancelled
    pub fn success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether any create, update or delete happened
    pub fn has_writes(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }

    pub(crate) fn absorb(&mut self, outcome: ReconcileOutcome) {
        self.created += outcome.created;
        self.updated += outcome.updated;
        self.deleted += outcome.deleted;
        self.unchanged += outcome.unchanged;
        self.actions.extend(outcome.actions);
    }

    pub(crate) fn fail(&mut self, key: impl Into<String>, side: Side, kind: ErrorKind, reason: String) {
        self.failures.push(SweepFailure {
            key: key.into(),
            side,
            kind,
            reason,
        });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Verdict;

    #[test]
    fn absorbs_outcome_counts_and_actions() {
        let mut report = SweepReport::new("glossaries", false);
        let mut outcome = ReconcileOutcome::new(Verdict::Create { origin: Side::Source }, None)
            .with_action("Created Glossary 'G' on destination (dst-1)".into());
        outcome.created = 1;
        report.absorb(outcome);
        report.absorb(ReconcileOutcome::unchanged(Verdict::ConfirmOnly, None));

        assert_eq!(report.created, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.actions.len(), 1);
        assert!(report.success());
        assert!(report.has_writes());
    }

    #[test]
    fn failures_and_cancellation_are_not_success() {
        let mut report = SweepReport::new("glossaries", false);
        report.fail("t1", Side::Destination, ErrorKind::Transient, "timeout".into());
        assert!(!report.success());
        assert_eq!(report.failed(), 1);

        let mut cancelled = SweepReport::new("glossaries", false);
        cancelled.cancelled = true;
        assert!(!cancelled.success());
    }

    #[test]
    fn serializes_to_json_with_kinds() {
        let mut report = SweepReport::new("glossaries", true);
        report.fail("t1", Side::Source, ErrorKind::Unauthorized, "denied".into());
        report.finish();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["kind"], "unauthorized");
        assert_eq!(json["failures"][0]["side"], "source");
        assert_eq!(json["dry_run"], true);
    }
}
