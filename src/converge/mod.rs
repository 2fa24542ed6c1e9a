//! Convergence algorithms.
//!
//! This module holds the building blocks a pass is made of, leaves first:
//! identity carrying, bounded retry of updates, single-object and keyed-list
//! reconciliation, the deletion sweep, and a read-only preview.

mod identity;
mod retry;
mod outcome;
mod single;
mod keyed;
mod sweep;
mod scope;
mod preview;

pub use identity::{carry_identity, copy_identity};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, PersistPolicy, Persisted, is_stale_update,
    persist_update,
};
pub use outcome::{ApplyReport, KeyedReport, Outcome, OutcomeCounts, ResourceOutcome};
pub use single::reconcile_one;
pub use keyed::{AbortOnError, ContinueOnError, ErrorDecision, ErrorPolicy, reconcile_keyed};
pub use sweep::sweep;
pub use scope::{ApplyScope, L4_HOST_ANNOTATION, L4_PORT_ANNOTATION, SWEEP_ORDER, l4_address};
pub use preview::{ChangePlan, PlanAction, PlannedChange, preview};
