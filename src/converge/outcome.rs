//! Per-resource outcomes and the reports that collect them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::{ConvergeError, ErrorClass, ReconcileError, Result};
use crate::resource::ResourceRef;

/// What happened to one resource during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was updated.
    Updated,
    /// The object already matched desired state; nothing was written.
    Unchanged,
    /// The object was deleted.
    Deleted,
    /// Nothing was done.
    Skipped {
        /// Why.
        reason: String,
    },
    /// The object could not be reconciled.
    Failed {
        /// Class of the error that stopped it.
        class: ErrorClass,
        /// Error message.
        message: String,
    },
}

impl Outcome {
    /// Builds a skipped outcome.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Builds a failed outcome from an error.
    #[must_use]
    pub fn failed(err: &ConvergeError) -> Self {
        Self::Failed {
            class: err.class(),
            message: err.to_string(),
        }
    }

    /// Returns true if the object could not be reconciled.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Converts a failed outcome into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ResourceFailed`] if the outcome is a failure.
    pub fn into_result(self, reference: &ResourceRef) -> Result<Self> {
        match self {
            Self::Failed { class, message } => Err(ReconcileError::ResourceFailed {
                reference: reference.clone(),
                class,
                reason: message,
            }
            .into()),
            other => Ok(other),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Deleted => write!(f, "deleted"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Failed { message, .. } => write!(f, "failed: {message}"),
        }
    }
}

/// Outcome for one named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutcome {
    /// The resource.
    pub reference: ResourceRef,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResourceOutcome {
    /// Creates a new resource outcome.
    #[must_use]
    pub const fn new(reference: ResourceRef, outcome: Outcome) -> Self {
        Self { reference, outcome }
    }
}

/// Tally of outcomes by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Objects created.
    pub created: usize,
    /// Objects updated.
    pub updated: usize,
    /// Objects left as they were.
    pub unchanged: usize,
    /// Objects deleted.
    pub deleted: usize,
    /// Objects skipped.
    pub skipped: usize,
    /// Objects that failed.
    pub failed: usize,
}

impl OutcomeCounts {
    fn tally<'a>(outcomes: impl IntoIterator<Item = &'a ResourceOutcome>) -> Self {
        let mut counts = Self::default();
        for entry in outcomes {
            match entry.outcome {
                Outcome::Created => counts.created += 1,
                Outcome::Updated => counts.updated += 1,
                Outcome::Unchanged => counts.unchanged += 1,
                Outcome::Deleted => counts.deleted += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// Number of objects written.
    #[must_use]
    pub const fn changed(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} deleted, {} skipped, {} failed",
            self.created, self.updated, self.unchanged, self.deleted, self.skipped, self.failed
        )
    }
}

/// Result of one apply pass.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Tenant the pass applied to.
    pub tenant_id: String,
    /// Application service id.
    pub service_id: String,
    /// Outcomes in the order resources were processed.
    pub outcomes: Vec<ResourceOutcome>,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ApplyReport {
    /// Starts an empty report.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            service_id: service_id.into(),
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records one outcome.
    pub fn push(&mut self, reference: ResourceRef, outcome: Outcome) {
        self.outcomes.push(ResourceOutcome::new(reference, outcome));
    }

    /// Marks the report finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Tallies the outcomes.
    #[must_use]
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.outcomes)
    }

    /// Returns true if any resource failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|entry| entry.outcome.is_failure())
    }

    /// Returns the outcome recorded for a resource, if any.
    #[must_use]
    pub fn outcome_of(&self, reference: &ResourceRef) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|entry| entry.reference == *reference)
            .map(|entry| &entry.outcome)
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.tenant_id, self.service_id, self.counts())
    }
}

/// Result of a keyed-list reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyedReport {
    /// Outcomes in processing order: new entries first, then leftovers.
    pub outcomes: Vec<ResourceOutcome>,
}

impl KeyedReport {
    /// Records one outcome.
    pub fn push(&mut self, reference: ResourceRef, outcome: Outcome) {
        self.outcomes.push(ResourceOutcome::new(reference, outcome));
    }

    /// Tallies the outcomes.
    #[must_use]
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.outcomes)
    }

    /// Appends another report.
    pub fn extend(&mut self, other: Self) {
        self.outcomes.extend(other.outcomes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::resource::ResourceKind;

    fn web() -> ResourceRef {
        ResourceRef::new(ResourceKind::Service, "tenant-a", "web")
    }

    #[test]
    fn test_failed_outcome_keeps_class() {
        let err = ConvergeError::from(StoreError::forbidden("namespace terminating"));
        let outcome = Outcome::failed(&err);
        assert!(outcome.is_failure());

        let err = outcome.into_result(&web()).expect_err("failure should convert");
        assert_eq!(err.class(), ErrorClass::Forbidden);
    }

    #[test]
    fn test_non_failures_pass_through() {
        let outcome = Outcome::Unchanged.into_result(&web()).expect("not a failure");
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ApplyReport::new("tenant-a", "svc-1");
        report.push(web(), Outcome::Created);
        report.push(web(), Outcome::Unchanged);
        report.push(web(), Outcome::skipped("already absent"));
        report.push(
            web(),
            Outcome::Failed {
                class: ErrorClass::Other,
                message: String::from("boom"),
            },
        );

        let counts = report.counts();
        assert_eq!(counts.created, 1);
        assert_eq!(counts.changed(), 1);
        assert_eq!(counts.failed, 1);
        assert!(report.has_failures());
        assert_eq!(report.outcome_of(&web()), Some(&Outcome::Created));
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let entry = ResourceOutcome::new(web(), Outcome::skipped("already absent"));
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "already absent");
        assert_eq!(json["reference"]["name"], "web");
    }
}
