//! Bounded retry around a single update.
//!
//! Every update the engine issues outside the keyed-list path goes through
//! [`persist_update`]. The error class of each failed attempt decides what
//! happens next:
//!
//! | Class       | Decision                                     |
//! |-------------|----------------------------------------------|
//! | `NotFound`  | success, the object is gone and stays gone   |
//! | `Conflict`  | stop, someone else changed the object        |
//! | `Forbidden` | stop, retrying cannot change the answer      |
//! | other       | warn, pause, try again until the budget ends |

use std::time::Duration;
use tracing::{debug, warn};

use crate::app::EngineSettings;
use crate::error::{ConvergeError, ErrorClass, ReconcileError, Result, StoreError};
use crate::resource::Resource;
use crate::store::ResourceApi;

/// Default number of attempts per update.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Retry budget for persisting one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistPolicy {
    /// Total attempts, at least one is always made.
    pub max_attempts: u32,
    /// Fixed pause between two attempts.
    pub interval: Duration,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl From<&EngineSettings> for PersistPolicy {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            interval: Duration::from_secs(settings.retry_interval_secs),
        }
    }
}

impl PersistPolicy {
    /// Sets the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Result of a successful persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted<R> {
    /// The update was written; holds the stored object.
    Written(R),
    /// The object disappeared before the update landed.
    Vanished,
}

/// Persists an update, retrying transient failures.
///
/// # Errors
///
/// Returns [`ReconcileError::StaleUpdate`] on a version conflict, the
/// store error on `Forbidden`, and the last store error once the attempt
/// budget is exhausted.
pub async fn persist_update<R, S>(
    store: &S,
    policy: &PersistPolicy,
    object: &R,
) -> Result<Persisted<R>>
where
    R: Resource,
    S: ResourceApi<R> + ?Sized,
{
    let reference = object.reference();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match store.update(object).await {
            Ok(written) => return Ok(Persisted::Written(written)),
            Err(err) => err,
        };

        match err.class() {
            ErrorClass::NotFound => {
                debug!("{reference} disappeared before the update landed, not recreating");
                return Ok(Persisted::Vanished);
            }
            ErrorClass::Conflict => return Err(stale_update(reference, err)),
            ErrorClass::Forbidden => return Err(err),
            ErrorClass::AlreadyExists | ErrorClass::Other => {}
        }

        if attempt >= max_attempts {
            warn!("Giving up on {reference} after {attempt} attempts: {err}");
            return Err(err);
        }

        warn!(
            "Failed to persist {reference} (attempt {attempt}/{max_attempts}), retrying in {:?}: {err}",
            policy.interval
        );
        tokio::time::sleep(policy.interval).await;
        attempt += 1;
    }
}

fn stale_update(reference: crate::resource::ResourceRef, err: ConvergeError) -> ConvergeError {
    match err {
        ConvergeError::Store(source) => ReconcileError::StaleUpdate { reference, source }.into(),
        other => other,
    }
}

/// Returns true when `err` is a stale-update conflict.
#[must_use]
pub const fn is_stale_update(err: &ConvergeError) -> bool {
    matches!(
        err,
        ConvergeError::Reconcile(ReconcileError::StaleUpdate { .. })
            | ConvergeError::Store(StoreError::Conflict { .. })
    )
}
